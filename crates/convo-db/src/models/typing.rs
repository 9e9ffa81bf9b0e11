//! Typing indicator database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for typing_indicators table
#[derive(Debug, Clone, FromRow)]
pub struct TypingIndicatorModel {
    pub conversation_id: i64,
    pub user_id: i64,
    pub started_at: DateTime<Utc>,
}
