//! Reaction and profile model -> entity mappers

use convo_core::entities::{Profile, Reaction};
use convo_core::value_objects::Snowflake;

use crate::models::{ProfileModel, ReactionModel};

impl From<ReactionModel> for Reaction {
    fn from(model: ReactionModel) -> Self {
        Reaction {
            message_id: Snowflake::new(model.message_id),
            user_id: Snowflake::new(model.user_id),
            emoji: model.emoji,
            created_at: model.created_at,
        }
    }
}

impl From<ProfileModel> for Profile {
    fn from(model: ProfileModel) -> Self {
        Profile {
            id: Snowflake::new(model.id),
            display_name: model.display_name,
            username: model.username,
            avatar_url: model.avatar_url,
        }
    }
}
