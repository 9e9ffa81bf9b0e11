//! Message and attachment model -> entity mappers

use convo_core::entities::{Attachment, Message, MessageStamp, MessageType};
use convo_core::value_objects::Snowflake;

use crate::models::{AttachmentModel, MessageModel, MessageStampModel};

impl From<MessageModel> for Message {
    fn from(model: MessageModel) -> Self {
        Message {
            id: Snowflake::new(model.id),
            conversation_id: Snowflake::new(model.conversation_id),
            sender_id: Snowflake::new(model.sender_id),
            content: model.content,
            message_type: MessageType::from_db(&model.message_type),
            is_edited: model.is_edited,
            edited_at: model.edited_at,
            is_deleted: model.is_deleted,
            deleted_at: model.deleted_at,
            reply_to_id: model.reply_to_id.map(Snowflake::new),
            metadata: model.metadata.map(|json| json.0),
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<MessageStampModel> for MessageStamp {
    fn from(model: MessageStampModel) -> Self {
        MessageStamp {
            id: Snowflake::new(model.id),
            conversation_id: Snowflake::new(model.conversation_id),
            sender_id: Snowflake::new(model.sender_id),
            created_at: model.created_at,
        }
    }
}

impl From<AttachmentModel> for Attachment {
    fn from(model: AttachmentModel) -> Self {
        Attachment {
            id: Snowflake::new(model.id),
            message_id: Snowflake::new(model.message_id),
            file_url: model.file_url,
            file_name: model.file_name,
            file_type: model.file_type,
            file_size: model.file_size,
            thumbnail_url: model.thumbnail_url,
            duration: model.duration,
            width: model.width,
            height: model.height,
            created_at: model.created_at,
        }
    }
}
