use serde::Serialize;
use tracing::debug;

use crate::{
    context::RequestContext,
    error::{AppError, AppResult},
    models::{OptionTally, PollId, PollType, Visibility},
    store::PollStore,
};

#[derive(Debug, Clone, Serialize)]
pub struct PollResults {
    pub id: PollId,
    pub question: String,
    pub poll_type: PollType,
    pub total_votes: i64,
    pub options: Vec<OptionTally>,
}

/// Tallies a poll for the requester.
///
/// The owner can always see their own results. Anyone else is refused a
/// private poll outright and a public poll until it has expired.
pub async fn get_results<S: PollStore>(
    store: &S,
    ctx: &RequestContext,
    poll_id: PollId,
) -> AppResult<PollResults> {
    let poll = store
        .find_poll(poll_id)
        .await?
        .ok_or_else(AppError::poll_not_found)?;
    let is_owner = poll.is_owned_by(ctx.actor);

    if !is_owner {
        if !poll.is_active {
            return Err(AppError::poll_not_found());
        }
        match poll.result_visibility {
            Visibility::Private => {
                debug!(poll = poll_id, user = %ctx.actor, "Private results refused");
                return Err(AppError::forbidden("Results are not public"));
            }
            Visibility::Public if !poll.is_expired(ctx.now) => {
                return Err(AppError::forbidden(
                    "Results are not available until the poll expires",
                ));
            }
            Visibility::Public => {}
        }
    }

    let mut tally = store.tally(poll_id).await?;
    if poll.poll_type == PollType::Comment {
        tally.options.clear();
    }

    Ok(PollResults {
        id: poll.id,
        question: poll.question,
        poll_type: poll.poll_type,
        total_votes: tally.total_votes,
        options: tally.options,
    })
}
