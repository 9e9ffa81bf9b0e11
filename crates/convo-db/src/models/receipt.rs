//! Read receipt database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for message_read_receipts table
#[derive(Debug, Clone, FromRow)]
pub struct ReadReceiptModel {
    pub message_id: i64,
    pub user_id: i64,
    pub delivered_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}
