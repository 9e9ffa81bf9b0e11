//! Typing indicator model -> entity mapper

use convo_core::entities::TypingIndicator;
use convo_core::value_objects::Snowflake;

use crate::models::TypingIndicatorModel;

impl From<TypingIndicatorModel> for TypingIndicator {
    fn from(model: TypingIndicatorModel) -> Self {
        TypingIndicator {
            conversation_id: Snowflake::new(model.conversation_id),
            user_id: Snowflake::new(model.user_id),
            started_at: model.started_at,
        }
    }
}
