//! Read receipt - per (message, user) delivery and read timestamps

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

/// `delivered_at` records that the message reached the user by push;
/// `read_at` that it was actually seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub message_id: Snowflake,
    pub user_id: Snowflake,
    pub delivered_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

impl ReadReceipt {
    pub fn delivered(message_id: Snowflake, user_id: Snowflake, at: DateTime<Utc>) -> Self {
        Self {
            message_id,
            user_id,
            delivered_at: at,
            read_at: None,
        }
    }

    pub fn read(message_id: Snowflake, user_id: Snowflake, at: DateTime<Utc>) -> Self {
        Self {
            read_at: Some(at),
            ..Self::delivered(message_id, user_id, at)
        }
    }

    #[inline]
    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }

    /// Set `read_at` unless it is already set
    pub fn mark_read(&mut self, at: DateTime<Utc>) {
        self.read_at.get_or_insert(at);
    }
}
