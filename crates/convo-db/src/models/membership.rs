//! Membership database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for conversation_members table
#[derive(Debug, Clone, FromRow)]
pub struct MembershipModel {
    pub conversation_id: i64,
    pub user_id: i64,
    pub role: String,
    pub joined_at: DateTime<Utc>,
    pub last_read_at: Option<DateTime<Utc>>,
    pub is_muted: bool,
    pub is_pinned: bool,
}
