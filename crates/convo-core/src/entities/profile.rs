//! Profile - display data resolved from the profile collaborator

use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Snowflake,
    pub display_name: Option<String>,
    pub username: String,
    pub avatar_url: Option<String>,
}

impl Profile {
    pub fn new(id: Snowflake, username: impl Into<String>) -> Self {
        Self {
            id,
            display_name: None,
            username: username.into(),
            avatar_url: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Display name if set and non-blank, otherwise the username
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.username)
    }
}
