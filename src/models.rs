// models.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;
pub type PollId = i64;
pub type OptionId = i64;
pub type VoteId = i64;

pub const TRUE_FALSE_OPTIONS: [&str; 2] = ["True", "False"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "poll_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PollType {
    Mcq,
    #[sqlx(rename = "tf")]
    #[serde(rename = "tf")]
    TrueFalse,
    Comment,
}

impl PollType {
    /// Whether votes on this poll select an option rather than carry a comment.
    pub fn takes_option(self) -> bool {
        matches!(self, PollType::Mcq | PollType::TrueFalse)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "result_visibility", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

impl Visibility {
    pub fn toggled(self) -> Self {
        match self {
            Visibility::Public => Visibility::Private,
            Visibility::Private => Visibility::Public,
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Poll {
    pub id: PollId,
    pub question: String,
    pub poll_type: PollType,
    pub duration: i32,
    pub result_visibility: Visibility,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

impl Poll {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + Duration::hours(i64::from(self.duration))
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at()
    }

    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.created_by == user
    }
}

#[derive(Debug, Clone)]
pub struct NewPoll {
    pub question: String,
    pub poll_type: PollType,
    pub duration: i32,
    pub result_visibility: Visibility,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// Field changes accepted by a poll update. `None` leaves the column as is.
#[derive(Debug, Clone, Default)]
pub struct PollChanges {
    pub question: Option<String>,
    pub duration: Option<i32>,
    pub result_visibility: Option<Visibility>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct PollOption {
    pub id: OptionId,
    #[serde(skip_serializing)]
    pub poll_id: PollId,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Vote {
    pub id: VoteId,
    #[serde(skip_serializing)]
    pub user_id: UserId,
    #[serde(rename = "poll")]
    pub poll_id: PollId,
    #[serde(rename = "option")]
    pub option_id: Option<OptionId>,
    pub comment: Option<String>,
    pub voted_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewVote {
    pub user_id: UserId,
    pub poll_id: PollId,
    pub option_id: Option<OptionId>,
    pub comment: Option<String>,
    pub voted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionTally {
    pub id: OptionId,
    pub text: String,
    pub vote_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    pub total_votes: i64,
    pub options: Vec<OptionTally>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn poll_created_at(created_at: DateTime<Utc>, duration: i32) -> Poll {
        Poll {
            id: 1,
            question: "Q".into(),
            poll_type: PollType::Mcq,
            duration,
            result_visibility: Visibility::Public,
            created_by: Uuid::nil(),
            created_at,
            is_active: true,
        }
    }

    #[test]
    fn expiry_is_strictly_after_the_window() {
        let created = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let poll = poll_created_at(created, 2);

        assert!(!poll.is_expired(created + Duration::hours(2)));
        assert!(poll.is_expired(created + Duration::hours(2) + Duration::seconds(1)));
    }

    #[test]
    fn visibility_toggles_both_ways() {
        assert_eq!(Visibility::Public.toggled(), Visibility::Private);
        assert_eq!(Visibility::Private.toggled(), Visibility::Public);
    }

    #[test]
    fn poll_type_wire_names() {
        assert_eq!(serde_json::to_string(&PollType::TrueFalse).unwrap(), "\"tf\"");
        assert_eq!(
            serde_json::from_str::<PollType>("\"comment\"").unwrap(),
            PollType::Comment
        );
        assert!(serde_json::from_str::<PollType>("\"essay\"").is_err());
    }
}
