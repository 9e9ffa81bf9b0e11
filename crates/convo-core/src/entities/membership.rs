//! Membership entity - links a user to a conversation and carries read state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

/// Role of a member inside a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Admin,
    #[default]
    Member,
}

impl MemberRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value {
            "admin" => Self::Admin,
            _ => Self::Member,
        }
    }
}

/// Membership row, unique per (conversation, user)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub conversation_id: Snowflake,
    pub user_id: Snowflake,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
    /// `None` means the member never read the conversation
    pub last_read_at: Option<DateTime<Utc>>,
    pub is_muted: bool,
    pub is_pinned: bool,
}

impl Membership {
    pub fn new(conversation_id: Snowflake, user_id: Snowflake, role: MemberRole) -> Self {
        Self {
            conversation_id,
            user_id,
            role,
            joined_at: Utc::now(),
            last_read_at: None,
            is_muted: false,
            is_pinned: false,
        }
    }

    #[inline]
    pub fn is_admin(&self) -> bool {
        self.role == MemberRole::Admin
    }

    /// Whether a message created at `created_at` is after this member's read mark
    #[inline]
    pub fn is_unread_at(&self, created_at: DateTime<Utc>) -> bool {
        self.last_read_at.map_or(true, |read| created_at > read)
    }
}
