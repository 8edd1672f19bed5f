// src/poll.rs
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    context::RequestContext,
    error::{AppError, AppResult},
    models::{NewPoll, Poll, PollId, PollOption, PollType, UserId, Visibility},
    store::PollStore,
    validation::{validate_poll, validate_update, PollDraft, PollUpdate},
};

/// A poll as shown to clients, with its options and derived expiry.
#[derive(Debug, Clone, Serialize)]
pub struct PollView {
    pub id: PollId,
    pub question: String,
    pub poll_type: PollType,
    pub duration: i32,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub result_visibility: Visibility,
    pub options: Vec<PollOption>,
    pub is_active: bool,
    pub is_expired: bool,
}

impl PollView {
    pub fn new(poll: Poll, options: Vec<PollOption>, now: DateTime<Utc>) -> Self {
        Self {
            is_expired: poll.is_expired(now),
            id: poll.id,
            question: poll.question,
            poll_type: poll.poll_type,
            duration: poll.duration,
            created_by: poll.created_by,
            created_at: poll.created_at,
            result_visibility: poll.result_visibility,
            options,
            is_active: poll.is_active,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    /// Every active poll.
    All,
    /// The requester's own polls, including deactivated ones.
    Mine,
}

/// Loads a poll the requester is allowed to modify.
async fn owned_poll<S: PollStore>(store: &S, ctx: &RequestContext, id: PollId) -> AppResult<Poll> {
    let poll = store.find_poll(id).await?.ok_or_else(AppError::poll_not_found)?;

    if !poll.is_owned_by(ctx.actor) {
        debug!(poll = id, user = %ctx.actor, "Rejected write by non-owner");
        return Err(AppError::forbidden(
            "You do not have permission to modify this poll.",
        ));
    }

    Ok(poll)
}

async fn view<S: PollStore>(store: &S, poll: Poll, now: DateTime<Utc>) -> AppResult<PollView> {
    let options = store.options_for(poll.id).await?;
    Ok(PollView::new(poll, options, now))
}

pub async fn create_poll<S: PollStore>(
    store: &S,
    ctx: &RequestContext,
    draft: &PollDraft,
) -> AppResult<PollView> {
    let valid = validate_poll(draft)?;

    let new_poll = NewPoll {
        question: valid.question,
        poll_type: valid.poll_type,
        duration: valid.duration,
        result_visibility: valid.result_visibility,
        created_by: ctx.actor,
        created_at: ctx.now,
    };
    let (poll, options) = store.insert_poll(new_poll, valid.options).await?;

    info!(poll = poll.id, user = %ctx.actor, poll_type = ?poll.poll_type, "Poll created");
    Ok(PollView::new(poll, options, ctx.now))
}

/// Active polls are visible to every authenticated user; deactivated ones
/// only to their owner.
pub async fn get_poll<S: PollStore>(
    store: &S,
    ctx: &RequestContext,
    id: PollId,
) -> AppResult<PollView> {
    let poll = store.find_poll(id).await?.ok_or_else(AppError::poll_not_found)?;

    if !poll.is_active && !poll.is_owned_by(ctx.actor) {
        return Err(AppError::poll_not_found());
    }

    view(store, poll, ctx.now).await
}

pub async fn list_polls<S: PollStore>(
    store: &S,
    ctx: &RequestContext,
    scope: ListScope,
) -> AppResult<Vec<PollView>> {
    let polls = match scope {
        ListScope::All => store.list_active().await?,
        ListScope::Mine => store.list_by_owner(ctx.actor).await?,
    };

    let ids: Vec<PollId> = polls.iter().map(|p| p.id).collect();
    let mut options: HashMap<PollId, Vec<PollOption>> = HashMap::new();
    for option in store.options_for_polls(&ids).await? {
        options.entry(option.poll_id).or_default().push(option);
    }

    Ok(polls
        .into_iter()
        .map(|poll| {
            let own = options.remove(&poll.id).unwrap_or_default();
            PollView::new(poll, own, ctx.now)
        })
        .collect())
}

pub async fn update_poll<S: PollStore>(
    store: &S,
    ctx: &RequestContext,
    id: PollId,
    update: &PollUpdate,
) -> AppResult<PollView> {
    let poll = owned_poll(store, ctx, id).await?;
    let (changes, options) = validate_update(poll.poll_type, update)?;
    let replaced = options.is_some();

    let poll = store
        .update_poll(id, changes, options)
        .await?
        .ok_or_else(AppError::poll_not_found)?;

    info!(poll = id, user = %ctx.actor, options_replaced = replaced, "Poll updated");
    view(store, poll, ctx.now).await
}

/// Soft delete: the poll leaves the public listing but keeps its rows.
pub async fn deactivate_poll<S: PollStore>(
    store: &S,
    ctx: &RequestContext,
    id: PollId,
) -> AppResult<()> {
    owned_poll(store, ctx, id).await?;

    if !store.deactivate(id).await? {
        return Err(AppError::poll_not_found());
    }

    info!(poll = id, user = %ctx.actor, "Poll deactivated");
    Ok(())
}

pub async fn toggle_visibility<S: PollStore>(
    store: &S,
    ctx: &RequestContext,
    id: PollId,
) -> AppResult<Visibility> {
    owned_poll(store, ctx, id).await?;

    let visibility = store
        .toggle_visibility(id)
        .await?
        .ok_or_else(AppError::poll_not_found)?;

    info!(poll = id, user = %ctx.actor, ?visibility, "Result visibility toggled");
    Ok(visibility)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::validation::OptionInput;
    use uuid::Uuid;

    fn draft(poll_type: PollType, options: &[&str]) -> PollDraft {
        PollDraft {
            question: "Favourite language?".into(),
            poll_type,
            duration: 24,
            result_visibility: Visibility::Public,
            options: options
                .iter()
                .map(|t| OptionInput {
                    text: t.to_string(),
                })
                .collect(),
        }
    }

    fn texts(view: &PollView) -> Vec<&str> {
        view.options.iter().map(|o| o.text.as_str()).collect()
    }

    #[tokio::test]
    async fn true_false_poll_materializes_fixed_options() {
        let store = MemoryStore::new();
        let ctx = RequestContext::new(Uuid::new_v4());

        let view = create_poll(&store, &ctx, &draft(PollType::TrueFalse, &["Yep", "Nope"]))
            .await
            .unwrap();

        assert_eq!(texts(&view), ["True", "False"]);
        assert_eq!(view.created_by, ctx.actor);
        assert!(view.is_active);
        assert!(!view.is_expired);
    }

    #[tokio::test]
    async fn rejected_poll_leaves_nothing_behind() {
        let store = MemoryStore::new();
        let ctx = RequestContext::new(Uuid::new_v4());

        let err = create_poll(&store, &ctx, &draft(PollType::Comment, &["nope"]))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(ref m) if m == "Comment polls cannot have options."));
        assert!(list_polls(&store, &ctx, ListScope::Mine).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn listing_hides_deactivated_polls_except_from_owner() {
        let store = MemoryStore::new();
        let owner = RequestContext::new(Uuid::new_v4());
        let other = RequestContext::new(Uuid::new_v4());

        let kept = create_poll(&store, &owner, &draft(PollType::Mcq, &["Rust", "Go"]))
            .await
            .unwrap();
        let dropped = create_poll(&store, &owner, &draft(PollType::Comment, &[]))
            .await
            .unwrap();
        deactivate_poll(&store, &owner, dropped.id).await.unwrap();

        let all = list_polls(&store, &other, ListScope::All).await.unwrap();
        assert_eq!(all.iter().map(|p| p.id).collect::<Vec<_>>(), [kept.id]);
        assert_eq!(texts(&all[0]), ["Rust", "Go"]);

        let mine = list_polls(&store, &owner, ListScope::Mine).await.unwrap();
        assert_eq!(mine.len(), 2);
        let comment = mine.iter().find(|p| p.id == dropped.id).unwrap();
        assert!(comment.options.is_empty());
        assert!(list_polls(&store, &other, ListScope::Mine).await.unwrap().is_empty());

        assert!(matches!(
            get_poll(&store, &other, dropped.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(!get_poll(&store, &owner, dropped.id).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn only_the_owner_may_modify() {
        let store = MemoryStore::new();
        let owner = RequestContext::new(Uuid::new_v4());
        let other = RequestContext::new(Uuid::new_v4());
        let poll = create_poll(&store, &owner, &draft(PollType::Mcq, &["a", "b"]))
            .await
            .unwrap();

        let update = PollUpdate {
            question: Some("Hijacked?".into()),
            ..Default::default()
        };
        assert!(matches!(
            update_poll(&store, &other, poll.id, &update).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            deactivate_poll(&store, &other, poll.id).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            toggle_visibility(&store, &other, poll.id).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            toggle_visibility(&store, &owner, 9_999).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn toggle_flips_back_and_forth() {
        let store = MemoryStore::new();
        let owner = RequestContext::new(Uuid::new_v4());
        let poll = create_poll(&store, &owner, &draft(PollType::Comment, &[]))
            .await
            .unwrap();

        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(toggle_visibility(&store, &owner, poll.id).await.unwrap());
        }

        assert_eq!(
            seen,
            [
                Visibility::Private,
                Visibility::Public,
                Visibility::Private,
                Visibility::Public
            ]
        );
    }

    #[tokio::test]
    async fn update_replaces_mcq_options_and_keeps_type() {
        let store = MemoryStore::new();
        let owner = RequestContext::new(Uuid::new_v4());
        let poll = create_poll(&store, &owner, &draft(PollType::Mcq, &["a", "b"]))
            .await
            .unwrap();

        let update = PollUpdate {
            question: Some("Pick one".into()),
            duration: Some(48),
            options: Some(
                ["x", "y", "z"]
                    .iter()
                    .map(|t| OptionInput {
                        text: t.to_string(),
                    })
                    .collect(),
            ),
            ..Default::default()
        };
        let updated = update_poll(&store, &owner, poll.id, &update).await.unwrap();

        assert_eq!(updated.question, "Pick one");
        assert_eq!(updated.duration, 48);
        assert_eq!(updated.poll_type, PollType::Mcq);
        assert_eq!(texts(&updated), ["x", "y", "z"]);

        let retype = PollUpdate {
            poll_type: Some(PollType::Comment),
            ..Default::default()
        };
        assert!(matches!(
            update_poll(&store, &owner, poll.id, &retype).await,
            Err(AppError::Validation(_))
        ));
    }
}
