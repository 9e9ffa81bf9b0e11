//! Profile database model

use sqlx::FromRow;

/// Database model for profiles table
#[derive(Debug, Clone, FromRow)]
pub struct ProfileModel {
    pub id: i64,
    pub display_name: Option<String>,
    pub username: String,
    pub avatar_url: Option<String>,
}
