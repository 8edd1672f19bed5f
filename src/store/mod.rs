//! Persistence boundary for users, sessions, polls, options and votes.
//!
//! Every mutating method is atomic: the Postgres store wraps each one in a
//! single transaction, the in-memory store performs it under one lock
//! acquisition. The `(voter, poll)` vote key and the user email are unique
//! at this layer, so callers may treat [`StoreError::UniqueViolation`] as the
//! final word on a race between concurrent writers.

use std::future::Future;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    NewPoll, NewUser, NewVote, Poll, PollChanges, PollId, PollOption, Tally, User, UserId,
    Visibility, Vote,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub const DUPLICATE_VOTE: &str = "You have already voted on this poll.";
pub const DUPLICATE_EMAIL: &str = "A user with this email already exists.";
pub const INVALID_OPTION: &str = "Selected option does not belong to this poll.";
pub const POLL_EXPIRED: &str = "This poll has expired.";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0}")]
    UniqueViolation(String),

    /// A referenced row is missing or belongs to another parent.
    #[error("{0}")]
    ForeignKeyViolation(String),

    /// The poll is missing or deactivated.
    #[error("Poll not found")]
    PollUnavailable,

    #[error("{}", POLL_EXPIRED)]
    PollExpired,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub trait PollStore: Send + Sync + 'static {
    /// Persists a poll together with its options, in the given order.
    fn insert_poll(
        &self,
        poll: NewPoll,
        options: Vec<String>,
    ) -> impl Future<Output = StoreResult<(Poll, Vec<PollOption>)>> + Send;

    fn find_poll(&self, id: PollId) -> impl Future<Output = StoreResult<Option<Poll>>> + Send;

    /// Active polls, newest first.
    fn list_active(&self) -> impl Future<Output = StoreResult<Vec<Poll>>> + Send;

    /// All polls created by `owner`, active or not, newest first.
    fn list_by_owner(&self, owner: UserId)
        -> impl Future<Output = StoreResult<Vec<Poll>>> + Send;

    /// Options of a poll in creation order.
    fn options_for(&self, poll: PollId)
        -> impl Future<Output = StoreResult<Vec<PollOption>>> + Send;

    /// Applies `changes` and, when `options` is given, replaces the whole
    /// option set. Votes pointing at replaced options are deleted with them.
    /// Returns `None` if the poll does not exist.
    fn update_poll(
        &self,
        id: PollId,
        changes: PollChanges,
        options: Option<Vec<String>>,
    ) -> impl Future<Output = StoreResult<Option<Poll>>> + Send;

    /// Clears the active flag. Returns `false` if the poll does not exist.
    fn deactivate(&self, id: PollId) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Flips the stored visibility and returns the new value.
    fn toggle_visibility(
        &self,
        id: PollId,
    ) -> impl Future<Output = StoreResult<Option<Visibility>>> + Send;

    /// Options of several polls in one round trip, ordered by option id.
    fn options_for_polls(
        &self,
        polls: &[PollId],
    ) -> impl Future<Output = StoreResult<Vec<PollOption>>> + Send;

    /// Records a vote after re-checking, against the same snapshot the
    /// insert commits in, that the poll is active and open at
    /// `vote.voted_at` and that a chosen option still belongs to it.
    ///
    /// Fails with [`StoreError::PollUnavailable`], [`StoreError::PollExpired`],
    /// [`StoreError::ForeignKeyViolation`] or, if the voter already has a vote
    /// on this poll, [`StoreError::UniqueViolation`].
    fn record_vote(&self, vote: NewVote) -> impl Future<Output = StoreResult<Vote>> + Send;

    /// Counts votes on demand; option rows follow creation order.
    fn tally(&self, poll: PollId) -> impl Future<Output = StoreResult<Tally>> + Send;
}

pub trait AccountStore: Send + Sync + 'static {
    /// Fails with [`StoreError::UniqueViolation`] on a taken email.
    fn insert_user(&self, user: NewUser) -> impl Future<Output = StoreResult<User>> + Send;

    fn find_user(&self, id: UserId) -> impl Future<Output = StoreResult<Option<User>>> + Send;

    fn find_user_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = StoreResult<Option<User>>> + Send;

    fn insert_session(
        &self,
        token: String,
        user: UserId,
        expires_at: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Resolves a bearer token to its user, ignoring sessions expired at `now`.
    fn find_session_user(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<Option<User>>> + Send;
}

/// Everything the HTTP layer needs from a backend.
pub trait Store: PollStore + AccountStore {}

impl<T: PollStore + AccountStore> Store for T {}
