//! Message entity - represents a message in a conversation, plus its attachments

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

/// Message type, derived from the attachment MIME type for uploads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Video,
    Voice,
    File,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Voice => "voice",
            Self::File => "file",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value {
            "image" => Self::Image,
            "video" => Self::Video,
            "voice" => Self::Voice,
            "file" => Self::File,
            _ => Self::Text,
        }
    }

    /// Map a MIME type to the message type of an upload
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.trim().to_ascii_lowercase();
        if mime.starts_with("image/") {
            Self::Image
        } else if mime.starts_with("video/") {
            Self::Video
        } else if mime.starts_with("audio/") {
            Self::Voice
        } else {
            Self::File
        }
    }
}

/// Message entity
///
/// Soft-deleted messages keep their row: `is_deleted` is set and `content`
/// is cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Snowflake,
    pub conversation_id: Snowflake,
    pub sender_id: Snowflake,
    pub content: Option<String>,
    pub message_type: MessageType,
    pub is_edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub reply_to_id: Option<Snowflake>,
    /// Free-form payload, e.g. the attachment summary of an upload
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    pub fn new(
        id: Snowflake,
        conversation_id: Snowflake,
        sender_id: Snowflake,
        content: Option<String>,
        message_type: MessageType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            conversation_id,
            sender_id,
            content,
            message_type,
            is_edited: false,
            edited_at: None,
            is_deleted: false,
            deleted_at: None,
            reply_to_id: None,
            metadata: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_reply_to(mut self, reply_to_id: Option<Snowflake>) -> Self {
        self.reply_to_id = reply_to_id;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    #[inline]
    pub fn is_reply(&self) -> bool {
        self.reply_to_id.is_some()
    }

    pub fn edit(&mut self, content: String, at: DateTime<Utc>) {
        self.content = Some(content);
        self.is_edited = true;
        self.edited_at = Some(at);
        self.updated_at = at;
    }

    pub fn soft_delete(&mut self, at: DateTime<Utc>) {
        self.content = None;
        self.is_deleted = true;
        self.deleted_at = Some(at);
        self.updated_at = at;
    }

    /// Thread ordering key: creation time, ties broken by id
    #[inline]
    pub fn order_key(&self) -> (DateTime<Utc>, Snowflake) {
        (self.created_at, self.id)
    }

    /// Short preview for conversation lists
    pub fn preview(&self, max_chars: usize) -> Option<String> {
        let content = self.content.as_deref()?;
        Some(content.chars().take(max_chars).collect())
    }
}

/// The columns of a message the unread counter needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageStamp {
    pub id: Snowflake,
    pub conversation_id: Snowflake,
    pub sender_id: Snowflake,
    pub created_at: DateTime<Utc>,
}

impl From<&Message> for MessageStamp {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            created_at: message.created_at,
        }
    }
}

/// Attachment entity; a message may carry zero or many
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Snowflake,
    pub message_id: Snowflake,
    pub file_url: String,
    pub file_name: String,
    /// MIME type
    pub file_type: String,
    pub file_size: Option<i64>,
    pub thumbnail_url: Option<String>,
    /// Media duration in seconds
    pub duration: Option<i32>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl Attachment {
    pub fn new(
        id: Snowflake,
        message_id: Snowflake,
        file_url: String,
        file_name: String,
        file_type: String,
        file_size: Option<i64>,
    ) -> Self {
        Self {
            id,
            message_id,
            file_url,
            file_name,
            file_type,
            file_size,
            thumbnail_url: None,
            duration: None,
            width: None,
            height: None,
            created_at: Utc::now(),
        }
    }

    pub fn category(&self) -> MessageType {
        MessageType::from_mime(&self.file_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> Message {
        Message::new(
            Snowflake::new(1),
            Snowflake::new(100),
            Snowflake::new(200),
            Some("Hello".to_string()),
            MessageType::Text,
        )
    }

    #[test]
    fn test_type_from_mime() {
        assert_eq!(MessageType::from_mime("image/png"), MessageType::Image);
        assert_eq!(MessageType::from_mime("VIDEO/mp4"), MessageType::Video);
        assert_eq!(MessageType::from_mime("audio/webm"), MessageType::Voice);
        assert_eq!(MessageType::from_mime("application/pdf"), MessageType::File);
        assert_eq!(MessageType::from_mime(""), MessageType::File);
    }

    #[test]
    fn test_edit_sets_flag_and_timestamp() {
        let mut msg = message();
        let at = Utc::now();
        msg.edit("Hello!".into(), at);
        assert!(msg.is_edited);
        assert_eq!(msg.edited_at, Some(at));
        assert_eq!(msg.content.as_deref(), Some("Hello!"));
    }

    #[test]
    fn test_soft_delete_clears_content() {
        let mut msg = message();
        msg.soft_delete(Utc::now());
        assert!(msg.is_deleted);
        assert!(msg.content.is_none());
        assert!(msg.deleted_at.is_some());
        assert!(msg.preview(10).is_none());
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        let mut msg = message();
        msg.content = Some("héllo wörld".into());
        assert_eq!(msg.preview(5).as_deref(), Some("héllo"));
    }

    #[test]
    fn test_attachment_category() {
        let att = Attachment::new(
            Snowflake::new(1),
            Snowflake::new(2),
            "https://cdn/x.ogg".into(),
            "x.ogg".into(),
            "audio/ogg".into(),
            Some(10),
        );
        assert_eq!(att.category(), MessageType::Voice);
    }
}
