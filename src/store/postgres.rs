// src/store/postgres.rs
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use super::{
    AccountStore, PollStore, StoreError, StoreResult, DUPLICATE_EMAIL, DUPLICATE_VOTE,
    INVALID_OPTION,
};
use crate::models::{
    NewPoll, NewUser, NewVote, OptionTally, Poll, PollChanges, PollId, PollOption, Tally, User,
    UserId, Visibility, Vote,
};

const POLL_COLUMNS: &str =
    "id, question, poll_type, duration, result_visibility, created_by, created_at, is_active";
const USER_COLUMNS: &str = "id, first_name, last_name, email, password_hash, created_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects, then applies any pending migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database migrations applied");

        Ok(Self::new(pool))
    }
}

/// Maps a unique violation to `duplicate`; the only composite foreign key
/// is a vote's `(option_id, poll_id)`.
fn constraint_violation(err: sqlx::Error, duplicate: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::UniqueViolation(duplicate.to_string())
        }
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            StoreError::ForeignKeyViolation(INVALID_OPTION.to_string())
        }
        _ => StoreError::Database(err),
    }
}

async fn insert_options(
    tx: &mut Transaction<'_, Postgres>,
    poll_id: PollId,
    texts: Vec<String>,
) -> StoreResult<Vec<PollOption>> {
    let mut options = Vec::with_capacity(texts.len());
    for text in texts {
        let option = sqlx::query_as::<_, PollOption>(
            "INSERT INTO options (poll_id, text) VALUES ($1, $2) RETURNING id, poll_id, text",
        )
        .bind(poll_id)
        .bind(text)
        .fetch_one(&mut **tx)
        .await?;
        options.push(option);
    }
    Ok(options)
}

impl PollStore for PgStore {
    async fn insert_poll(
        &self,
        poll: NewPoll,
        options: Vec<String>,
    ) -> StoreResult<(Poll, Vec<PollOption>)> {
        let mut tx = self.pool.begin().await?;

        let poll = sqlx::query_as::<_, Poll>(&format!(
            "INSERT INTO polls (question, poll_type, duration, result_visibility, created_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {POLL_COLUMNS}"
        ))
        .bind(poll.question)
        .bind(poll.poll_type)
        .bind(poll.duration)
        .bind(poll.result_visibility)
        .bind(poll.created_by)
        .bind(poll.created_at)
        .fetch_one(&mut *tx)
        .await?;

        let options = insert_options(&mut tx, poll.id, options).await?;
        tx.commit().await?;

        Ok((poll, options))
    }

    async fn find_poll(&self, id: PollId) -> StoreResult<Option<Poll>> {
        let poll = sqlx::query_as::<_, Poll>(&format!("SELECT {POLL_COLUMNS} FROM polls WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(poll)
    }

    async fn list_active(&self) -> StoreResult<Vec<Poll>> {
        let polls = sqlx::query_as::<_, Poll>(&format!(
            "SELECT {POLL_COLUMNS} FROM polls WHERE is_active ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(polls)
    }

    async fn list_by_owner(&self, owner: UserId) -> StoreResult<Vec<Poll>> {
        let polls = sqlx::query_as::<_, Poll>(&format!(
            "SELECT {POLL_COLUMNS} FROM polls WHERE created_by = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        Ok(polls)
    }

    async fn options_for(&self, poll: PollId) -> StoreResult<Vec<PollOption>> {
        let options = sqlx::query_as::<_, PollOption>(
            "SELECT id, poll_id, text FROM options WHERE poll_id = $1 ORDER BY id",
        )
        .bind(poll)
        .fetch_all(&self.pool)
        .await?;
        Ok(options)
    }

    async fn update_poll(
        &self,
        id: PollId,
        changes: PollChanges,
        options: Option<Vec<String>>,
    ) -> StoreResult<Option<Poll>> {
        let mut tx = self.pool.begin().await?;

        let poll = sqlx::query_as::<_, Poll>(&format!(
            "UPDATE polls SET \
                question = COALESCE($2, question), \
                duration = COALESCE($3, duration), \
                result_visibility = COALESCE($4, result_visibility) \
             WHERE id = $1 RETURNING {POLL_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.question)
        .bind(changes.duration)
        .bind(changes.result_visibility)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(poll) = poll else {
            return Ok(None);
        };

        if let Some(texts) = options {
            // Votes go first so no row ever points at a missing option.
            sqlx::query("DELETE FROM votes WHERE poll_id = $1 AND option_id IS NOT NULL")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM options WHERE poll_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_options(&mut tx, id, texts).await?;
        }

        tx.commit().await?;
        Ok(Some(poll))
    }

    async fn deactivate(&self, id: PollId) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE polls SET is_active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn toggle_visibility(&self, id: PollId) -> StoreResult<Option<Visibility>> {
        let visibility = sqlx::query_scalar::<_, Visibility>(
            "UPDATE polls SET result_visibility = CASE result_visibility \
                WHEN 'public' THEN 'private'::result_visibility \
                ELSE 'public'::result_visibility END \
             WHERE id = $1 RETURNING result_visibility",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(visibility)
    }

    async fn options_for_polls(&self, polls: &[PollId]) -> StoreResult<Vec<PollOption>> {
        let options = sqlx::query_as::<_, PollOption>(
            "SELECT id, poll_id, text FROM options WHERE poll_id = ANY($1) ORDER BY id",
        )
        .bind(polls)
        .fetch_all(&self.pool)
        .await?;
        Ok(options)
    }

    async fn record_vote(&self, vote: NewVote) -> StoreResult<Vote> {
        let mut tx = self.pool.begin().await?;

        // FOR SHARE lets voters proceed together but waits out a concurrent
        // update, deactivate or toggle on the same poll.
        let poll = sqlx::query_as::<_, Poll>(&format!(
            "SELECT {POLL_COLUMNS} FROM polls WHERE id = $1 FOR SHARE"
        ))
        .bind(vote.poll_id)
        .fetch_optional(&mut *tx)
        .await?
        .filter(|p| p.is_active)
        .ok_or(StoreError::PollUnavailable)?;

        if poll.is_expired(vote.voted_at) {
            return Err(StoreError::PollExpired);
        }

        if let Some(option_id) = vote.option_id {
            let belongs = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM options WHERE id = $1 AND poll_id = $2)",
            )
            .bind(option_id)
            .bind(vote.poll_id)
            .fetch_one(&mut *tx)
            .await?;
            if !belongs {
                return Err(StoreError::ForeignKeyViolation(INVALID_OPTION.to_string()));
            }
        }

        let voted = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM votes WHERE user_id = $1 AND poll_id = $2)",
        )
        .bind(vote.user_id)
        .bind(vote.poll_id)
        .fetch_one(&mut *tx)
        .await?;
        if voted {
            return Err(StoreError::UniqueViolation(DUPLICATE_VOTE.to_string()));
        }

        let vote = sqlx::query_as::<_, Vote>(
            "INSERT INTO votes (user_id, poll_id, option_id, comment, voted_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, user_id, poll_id, option_id, comment, voted_at",
        )
        .bind(vote.user_id)
        .bind(vote.poll_id)
        .bind(vote.option_id)
        .bind(vote.comment)
        .bind(vote.voted_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| constraint_violation(e, DUPLICATE_VOTE))?;

        tx.commit().await?;
        Ok(vote)
    }

    async fn tally(&self, poll: PollId) -> StoreResult<Tally> {
        let mut tx = self.pool.begin().await?;

        let total_votes = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM votes WHERE poll_id = $1")
            .bind(poll)
            .fetch_one(&mut *tx)
            .await?;

        let rows = sqlx::query_as::<_, (i64, String, i64)>(
            "SELECT o.id, o.text, COUNT(v.id) AS vote_count \
             FROM options o LEFT JOIN votes v ON v.option_id = o.id \
             WHERE o.poll_id = $1 \
             GROUP BY o.id, o.text \
             ORDER BY o.id",
        )
        .bind(poll)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Tally {
            total_votes,
            options: rows
                .into_iter()
                .map(|(id, text, vote_count)| OptionTally {
                    id,
                    text,
                    vote_count,
                })
                .collect(),
        })
    }
}

impl AccountStore for PgStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, first_name, last_name, email, password_hash, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user.first_name)
        .bind(user.last_name)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| constraint_violation(e, DUPLICATE_EMAIL))
    }

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn insert_session(
        &self,
        token: String,
        user: UserId,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(token)
            .bind(user)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_session_user(&self, token: &str, now: DateTime<Utc>) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT u.id, u.first_name, u.last_name, u.email, u.password_hash, u.created_at \
             FROM sessions s JOIN users u ON u.id = s.user_id \
             WHERE s.token = $1 AND s.expires_at > $2",
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}
