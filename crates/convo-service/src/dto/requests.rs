//! Request DTOs for engine operations
//!
//! Requests derive `Validate`; services validate them before any store call.

use serde::Deserialize;
use validator::Validate;

use convo_core::{MessageType, Snowflake};

// ============================================================================
// Message Requests
// ============================================================================

/// Send a message; checked by the pipeline against the configured limits
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    /// Zero means "not chosen yet" and is rejected
    pub conversation_id: Snowflake,

    pub sender_id: Snowflake,

    pub content: Option<String>,

    #[serde(default)]
    pub message_type: MessageType,

    pub reply_to_id: Option<Snowflake>,
}

impl SendMessageRequest {
    pub fn text(conversation_id: Snowflake, sender_id: Snowflake, content: impl Into<String>) -> Self {
        Self {
            conversation_id,
            sender_id,
            content: Some(content.into()),
            message_type: MessageType::Text,
            reply_to_id: None,
        }
    }

    pub fn replying_to(mut self, message_id: Snowflake) -> Self {
        self.reply_to_id = Some(message_id);
        self
    }

    /// Content with surrounding whitespace removed; `None` when blank
    pub fn trimmed_content(&self) -> Option<&str> {
        self.content
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

/// Upload a file and post it as a message
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UploadRequest {
    pub conversation_id: Snowflake,

    pub sender_id: Snowflake,

    #[validate(length(min = 1, max = 255, message = "File name must be 1-255 characters"))]
    pub file_name: String,

    #[validate(length(min = 1, max = 255, message = "Content type is required"))]
    pub content_type: String,

    #[serde(skip)]
    pub bytes: Vec<u8>,

    /// Optional text sent with the file
    #[validate(length(max = 4000, message = "Caption must be at most 4000 characters"))]
    pub caption: Option<String>,
}

impl UploadRequest {
    pub fn new(
        conversation_id: Snowflake,
        sender_id: Snowflake,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            conversation_id,
            sender_id,
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
            caption: None,
        }
    }

    /// File extension used in the stored path
    pub fn extension(&self) -> &str {
        match self.file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext,
            _ => "bin",
        }
    }
}

/// Add or remove a reaction
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReactionRequest {
    pub message_id: Snowflake,

    pub user_id: Snowflake,

    #[validate(length(min = 1, max = 32, message = "Emoji must be 1-32 characters"))]
    pub emoji: String,
}

impl ReactionRequest {
    pub fn new(message_id: Snowflake, user_id: Snowflake, emoji: impl Into<String>) -> Self {
        Self {
            message_id,
            user_id,
            emoji: emoji.into(),
        }
    }
}

// ============================================================================
// Conversation Requests
// ============================================================================

/// Create a group conversation
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 100, message = "Group name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    /// Members besides the creator
    #[validate(length(min = 1, max = 250, message = "A group needs 1-250 other members"))]
    pub member_ids: Vec<Snowflake>,
}

/// Rename or restyle a conversation; `None` fields stay unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateConversationRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    #[validate(url(message = "Avatar must be a URL"))]
    pub avatar_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trimmed_content() {
        let req = SendMessageRequest::text(Snowflake::new(1), Snowflake::new(2), "  hi  ");
        assert_eq!(req.trimmed_content(), Some("hi"));
        let blank = SendMessageRequest::text(Snowflake::new(1), Snowflake::new(2), "   ");
        assert_eq!(blank.trimmed_content(), None);
    }

    #[test]
    fn test_upload_extension() {
        let mut req = UploadRequest::new(
            Snowflake::new(1),
            Snowflake::new(2),
            "photo.final.PNG",
            "image/png",
            vec![],
        );
        assert_eq!(req.extension(), "PNG");
        req.file_name = "README".into();
        assert_eq!(req.extension(), "bin");
        req.file_name = ".env".into();
        assert_eq!(req.extension(), "bin");
    }

    #[test]
    fn test_group_request_needs_members() {
        let req = CreateGroupRequest {
            name: Some("Band".into()),
            description: None,
            member_ids: vec![],
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_update_request_rejects_bad_avatar() {
        let req = UpdateConversationRequest {
            avatar_url: Some("not a url".into()),
            ..Default::default()
        };
        assert!(req.validate().is_err());
        assert!(UpdateConversationRequest::default().validate().is_ok());
    }

    #[test]
    fn test_reaction_request_limits_emoji() {
        assert!(ReactionRequest::new(Snowflake::new(1), Snowflake::new(2), "").validate().is_err());
        assert!(ReactionRequest::new(Snowflake::new(1), Snowflake::new(2), "👍").validate().is_ok());
    }
}
