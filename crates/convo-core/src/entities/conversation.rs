//! Conversation entity - a direct (two-party) or group thread

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

/// Conversation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    #[default]
    Direct,
    Group,
}

impl ConversationKind {
    /// Column value used by the relational store
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Group => "group",
        }
    }

    /// Parse a stored value; unknown values are treated as groups
    pub fn from_db(value: &str) -> Self {
        match value {
            "direct" => Self::Direct,
            _ => Self::Group,
        }
    }
}

/// Conversation entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Snowflake,
    pub kind: ConversationKind,
    pub name: Option<String>,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub created_by: Snowflake,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Last-activity timestamp, `None` until the first message
    pub last_message_at: Option<DateTime<Utc>>,
    pub is_archived: bool,
}

impl Conversation {
    fn with_kind(id: Snowflake, kind: ConversationKind, created_by: Snowflake) -> Self {
        let now = Utc::now();
        Self {
            id,
            kind,
            name: None,
            description: None,
            avatar_url: None,
            created_by,
            created_at: now,
            updated_at: now,
            last_message_at: None,
            is_archived: false,
        }
    }

    /// Create a direct conversation
    pub fn new_direct(id: Snowflake, created_by: Snowflake) -> Self {
        Self::with_kind(id, ConversationKind::Direct, created_by)
    }

    /// Create a named group conversation
    pub fn new_group(id: Snowflake, created_by: Snowflake, name: Option<String>) -> Self {
        Self {
            name,
            ..Self::with_kind(id, ConversationKind::Group, created_by)
        }
    }

    #[inline]
    pub fn is_direct(&self) -> bool {
        self.kind == ConversationKind::Direct
    }

    /// Move last activity forward; never moves it backwards
    pub fn touch(&mut self, at: DateTime<Utc>) {
        if self.last_message_at.map_or(true, |current| at > current) {
            self.last_message_at = Some(at);
        }
    }
}

/// The two users of a direct conversation, in canonical order
///
/// `(a, b)` and `(b, a)` produce the same pair, so the pair can serve as a
/// unique key that makes creating a direct conversation idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirectPair {
    low: Snowflake,
    high: Snowflake,
}

impl DirectPair {
    /// `None` when both sides are the same user
    pub fn new(a: Snowflake, b: Snowflake) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Some(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn users(self) -> (Snowflake, Snowflake) {
        (self.low, self.high)
    }

    /// Column value of the unique key
    pub fn key(self) -> String {
        format!("{}:{}", self.low, self.high)
    }
}
