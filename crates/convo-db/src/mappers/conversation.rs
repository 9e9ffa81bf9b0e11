//! Conversation model -> entity mapper

use convo_core::entities::{Conversation, ConversationKind};
use convo_core::value_objects::Snowflake;

use crate::models::ConversationModel;

impl From<ConversationModel> for Conversation {
    fn from(model: ConversationModel) -> Self {
        Conversation {
            id: Snowflake::new(model.id),
            kind: ConversationKind::from_db(&model.kind),
            name: model.name,
            description: model.description,
            avatar_url: model.avatar_url,
            created_by: Snowflake::new(model.created_by),
            created_at: model.created_at,
            updated_at: model.updated_at,
            last_message_at: model.last_message_at,
            is_archived: model.is_archived,
        }
    }
}
