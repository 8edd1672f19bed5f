//! In-process store used by tests and by `STORE_BACKEND=memory`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{
    AccountStore, PollStore, StoreError, StoreResult, DUPLICATE_EMAIL, DUPLICATE_VOTE,
    INVALID_OPTION,
};
use crate::models::{
    NewPoll, NewUser, NewVote, OptionId, OptionTally, Poll, PollChanges, PollId, PollOption,
    Tally, User, UserId, Visibility, Vote, VoteId,
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    sessions: HashMap<String, (UserId, DateTime<Utc>)>,
    polls: Vec<Poll>,
    options: Vec<PollOption>,
    votes: Vec<Vote>,
    next_poll_id: PollId,
    next_option_id: OptionId,
    next_vote_id: VoteId,
}

impl Tables {
    fn push_options(&mut self, poll_id: PollId, texts: Vec<String>) -> Vec<PollOption> {
        texts
            .into_iter()
            .map(|text| {
                self.next_option_id += 1;
                let option = PollOption {
                    id: self.next_option_id,
                    poll_id,
                    text,
                };
                self.options.push(option.clone());
                option
            })
            .collect()
    }

    fn newest_first(mut polls: Vec<Poll>) -> Vec<Poll> {
        polls.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        polls
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PollStore for MemoryStore {
    async fn insert_poll(
        &self,
        poll: NewPoll,
        options: Vec<String>,
    ) -> StoreResult<(Poll, Vec<PollOption>)> {
        let mut tables = self.tables.lock().await;

        tables.next_poll_id += 1;
        let poll = Poll {
            id: tables.next_poll_id,
            question: poll.question,
            poll_type: poll.poll_type,
            duration: poll.duration,
            result_visibility: poll.result_visibility,
            created_by: poll.created_by,
            created_at: poll.created_at,
            is_active: true,
        };
        tables.polls.push(poll.clone());
        let options = tables.push_options(poll.id, options);

        Ok((poll, options))
    }

    async fn find_poll(&self, id: PollId) -> StoreResult<Option<Poll>> {
        let tables = self.tables.lock().await;
        Ok(tables.polls.iter().find(|p| p.id == id).cloned())
    }

    async fn list_active(&self) -> StoreResult<Vec<Poll>> {
        let tables = self.tables.lock().await;
        let polls = tables.polls.iter().filter(|p| p.is_active).cloned().collect();
        Ok(Tables::newest_first(polls))
    }

    async fn list_by_owner(&self, owner: UserId) -> StoreResult<Vec<Poll>> {
        let tables = self.tables.lock().await;
        let polls = tables
            .polls
            .iter()
            .filter(|p| p.created_by == owner)
            .cloned()
            .collect();
        Ok(Tables::newest_first(polls))
    }

    async fn options_for(&self, poll: PollId) -> StoreResult<Vec<PollOption>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .options
            .iter()
            .filter(|o| o.poll_id == poll)
            .cloned()
            .collect())
    }

    async fn update_poll(
        &self,
        id: PollId,
        changes: PollChanges,
        options: Option<Vec<String>>,
    ) -> StoreResult<Option<Poll>> {
        let mut tables = self.tables.lock().await;

        let Some(poll) = tables.polls.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if let Some(question) = changes.question {
            poll.question = question;
        }
        if let Some(duration) = changes.duration {
            poll.duration = duration;
        }
        if let Some(visibility) = changes.result_visibility {
            poll.result_visibility = visibility;
        }
        let updated = poll.clone();

        if let Some(texts) = options {
            tables
                .votes
                .retain(|v| !(v.poll_id == id && v.option_id.is_some()));
            tables.options.retain(|o| o.poll_id != id);
            tables.push_options(id, texts);
        }

        Ok(Some(updated))
    }

    async fn deactivate(&self, id: PollId) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables.polls.iter_mut().find(|p| p.id == id) {
            Some(poll) => {
                poll.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn toggle_visibility(&self, id: PollId) -> StoreResult<Option<Visibility>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.polls.iter_mut().find(|p| p.id == id).map(|poll| {
            poll.result_visibility = poll.result_visibility.toggled();
            poll.result_visibility
        }))
    }

    async fn options_for_polls(&self, polls: &[PollId]) -> StoreResult<Vec<PollOption>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .options
            .iter()
            .filter(|o| polls.contains(&o.poll_id))
            .cloned()
            .collect())
    }

    async fn record_vote(&self, vote: NewVote) -> StoreResult<Vote> {
        let mut tables = self.tables.lock().await;

        let poll = tables
            .polls
            .iter()
            .find(|p| p.id == vote.poll_id && p.is_active)
            .ok_or(StoreError::PollUnavailable)?;
        if poll.is_expired(vote.voted_at) {
            return Err(StoreError::PollExpired);
        }

        if let Some(option_id) = vote.option_id {
            if !tables
                .options
                .iter()
                .any(|o| o.id == option_id && o.poll_id == vote.poll_id)
            {
                return Err(StoreError::ForeignKeyViolation(INVALID_OPTION.to_string()));
            }
        }

        if tables
            .votes
            .iter()
            .any(|v| v.user_id == vote.user_id && v.poll_id == vote.poll_id)
        {
            return Err(StoreError::UniqueViolation(DUPLICATE_VOTE.to_string()));
        }

        tables.next_vote_id += 1;
        let vote = Vote {
            id: tables.next_vote_id,
            user_id: vote.user_id,
            poll_id: vote.poll_id,
            option_id: vote.option_id,
            comment: vote.comment,
            voted_at: vote.voted_at,
        };
        tables.votes.push(vote.clone());

        Ok(vote)
    }

    async fn tally(&self, poll: PollId) -> StoreResult<Tally> {
        let tables = self.tables.lock().await;

        let votes: Vec<&Vote> = tables.votes.iter().filter(|v| v.poll_id == poll).collect();
        let options = tables
            .options
            .iter()
            .filter(|o| o.poll_id == poll)
            .map(|o| OptionTally {
                id: o.id,
                text: o.text.clone(),
                vote_count: votes.iter().filter(|v| v.option_id == Some(o.id)).count() as i64,
            })
            .collect();

        Ok(Tally {
            total_votes: votes.len() as i64,
            options,
        })
    }
}

impl AccountStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.lock().await;

        if tables
            .users
            .iter()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(StoreError::UniqueViolation(DUPLICATE_EMAIL.to_string()));
        }

        let user = User {
            id: uuid::Uuid::new_v4(),
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: user.created_at,
        };
        tables.users.push(user.clone());

        Ok(user)
    }

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn insert_session(
        &self,
        token: String,
        user: UserId,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        tables.sessions.insert(token, (user, expires_at));
        Ok(())
    }

    async fn find_session_user(&self, token: &str, now: DateTime<Utc>) -> StoreResult<Option<User>> {
        let tables = self.tables.lock().await;
        let user = match tables.sessions.get(token) {
            Some((user, expires_at)) if *expires_at > now => *user,
            _ => return Ok(None),
        };
        Ok(tables.users.iter().find(|u| u.id == user).cloned())
    }
}
