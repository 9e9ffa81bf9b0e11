//! Reaction entity - an emoji reaction on a message, unique per (message, user, emoji)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub message_id: Snowflake,
    pub user_id: Snowflake,
    pub emoji: String,
    pub created_at: DateTime<Utc>,
}

impl Reaction {
    pub fn new(message_id: Snowflake, user_id: Snowflake, emoji: impl Into<String>) -> Self {
        Self {
            message_id,
            user_id,
            emoji: emoji.into(),
            created_at: Utc::now(),
        }
    }

    /// Identity triple used by add/remove
    #[inline]
    pub fn key(&self) -> (Snowflake, Snowflake, &str) {
        (self.message_id, self.user_id, self.emoji.as_str())
    }
}

/// Per-emoji tally for a message, from the viewer's perspective
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReactionCount {
    pub emoji: String,
    pub count: usize,
    pub me: bool,
}

impl ReactionCount {
    /// Tally reactions in first-seen emoji order
    pub fn tally<'a, I>(reactions: I, viewer: Snowflake) -> Vec<Self>
    where
        I: IntoIterator<Item = &'a Reaction>,
    {
        let mut counts: Vec<Self> = Vec::new();
        for reaction in reactions {
            let mine = reaction.user_id == viewer;
            match counts.iter_mut().find(|c| c.emoji == reaction.emoji) {
                Some(existing) => {
                    existing.count += 1;
                    existing.me |= mine;
                }
                None => counts.push(Self {
                    emoji: reaction.emoji.clone(),
                    count: 1,
                    me: mine,
                }),
            }
        }
        counts
    }
}
