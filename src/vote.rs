//! Casting votes.
//!
//! A poll is open until `created_at + duration` and closed afterwards; only
//! open, active polls take votes. Rules are checked in a fixed order so the
//! caller always sees the first one broken:
//!
//! 1. the poll exists and is active
//! 2. the poll has not expired
//! 3. the ballot shape matches the poll type
//! 4. a chosen option belongs to this poll
//! 5. the voter has not voted on this poll yet
//!
//! Steps 1 and 2 run here first so an expired poll is reported before a bad
//! ballot. [`PollStore::record_vote`] then repeats 1, 2, 4 and 5 inside the
//! write itself, so a concurrent deactivate, option replacement or second
//! vote cannot slip between check and insert.

use tracing::{debug, info};

use crate::{
    context::RequestContext,
    error::{AppError, AppResult},
    models::{NewVote, PollId, Vote},
    store::{PollStore, POLL_EXPIRED},
    validation::{validate_ballot, Ballot, Choice},
};

pub async fn cast_vote<S: PollStore>(
    store: &S,
    ctx: &RequestContext,
    poll_id: PollId,
    ballot: &Ballot,
) -> AppResult<Vote> {
    let poll = store
        .find_poll(poll_id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(AppError::poll_not_found)?;

    if poll.is_expired(ctx.now) {
        debug!(poll = poll_id, user = %ctx.actor, "Vote after expiry rejected");
        return Err(AppError::Expired(POLL_EXPIRED.to_string()));
    }

    let (option_id, comment) = match validate_ballot(poll.poll_type, ballot)? {
        Choice::Option(option_id) => (Some(option_id), None),
        Choice::Comment(comment) => (None, Some(comment)),
    };

    let vote = store
        .record_vote(NewVote {
            user_id: ctx.actor,
            poll_id,
            option_id,
            comment,
            voted_at: ctx.now,
        })
        .await?;

    info!(poll = poll_id, user = %ctx.actor, vote = vote.id, "Vote recorded");
    Ok(vote)
}
