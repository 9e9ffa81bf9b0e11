//! Typing indicator - ephemeral per (conversation, user) row

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingIndicator {
    pub conversation_id: Snowflake,
    pub user_id: Snowflake,
    pub started_at: DateTime<Utc>,
}

impl TypingIndicator {
    pub fn new(conversation_id: Snowflake, user_id: Snowflake) -> Self {
        Self {
            conversation_id,
            user_id,
            started_at: Utc::now(),
        }
    }

    /// True when the row is older than `window` at `now`
    pub fn is_stale(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.started_at > window
    }
}
