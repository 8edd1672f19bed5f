use chrono::{DateTime, Utc};

use crate::models::UserId;

/// Identity and clock for one request. Every core operation takes this
/// explicitly; nothing reads the current user from ambient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub actor: UserId,
    pub now: DateTime<Utc>,
}

impl RequestContext {
    pub fn new(actor: UserId) -> Self {
        Self::at(actor, Utc::now())
    }

    pub fn at(actor: UserId, now: DateTime<Utc>) -> Self {
        Self { actor, now }
    }
}
