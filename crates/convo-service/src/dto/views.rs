//! Enriched read models returned by the loaders
//!
//! Views serialize with Snowflake IDs as strings.

use chrono::{DateTime, Utc};
use serde::Serialize;

use convo_core::{
    Attachment, Conversation, ConversationKind, MemberRole, Message, MessageType, ReactionCount,
    Reaction, ReadReceipt, Snowflake,
};

// ============================================================================
// Profiles and members
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileView {
    pub id: Snowflake,
    pub display_name: Option<String>,
    pub username: String,
    pub avatar_url: Option<String>,
}

impl ProfileView {
    /// Display name, or the username when none is set
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.username)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberView {
    pub user_id: Snowflake,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
    pub last_read_at: Option<DateTime<Utc>>,
    pub is_muted: bool,
    pub is_pinned: bool,
    /// Missing when the profile collaborator has no row for the user
    pub profile: Option<ProfileView>,
}

// ============================================================================
// Conversation list
// ============================================================================

/// The newest non-deleted message of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageSummary {
    pub id: Snowflake,
    pub sender_id: Snowflake,
    pub content: Option<String>,
    pub message_type: MessageType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationView {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub members: Vec<MemberView>,
    pub last_message: Option<MessageSummary>,
    pub unread_count: usize,
    /// The other participant of a direct conversation
    pub other_user: Option<ProfileView>,
    pub is_pinned: bool,
    pub is_muted: bool,
}

impl ConversationView {
    #[inline]
    pub fn id(&self) -> Snowflake {
        self.conversation.id
    }

    #[inline]
    pub fn kind(&self) -> ConversationKind {
        self.conversation.kind
    }

    /// Group name, or the other participant's label for direct chats
    pub fn title(&self) -> String {
        if let Some(name) = self.conversation.name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        self.other_user
            .as_ref()
            .map_or_else(|| "Conversation".to_string(), |p| p.label().to_string())
    }

    /// Preview line for the list, "No messages yet" when empty
    pub fn preview(&self) -> String {
        match &self.last_message {
            None => "No messages yet".to_string(),
            Some(summary) => match (&summary.content, summary.message_type) {
                (Some(text), _) if !text.is_empty() => text.clone(),
                (_, MessageType::Text) => String::new(),
                (_, other) => format!("[{}]", other.as_str()),
            },
        }
    }
}

// ============================================================================
// Thread
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageView {
    #[serde(flatten)]
    pub message: Message,
    pub sender: Option<ProfileView>,
    pub reactions: Vec<Reaction>,
    pub reaction_summary: Vec<ReactionCount>,
    pub attachments: Vec<Attachment>,
    pub receipts: Vec<ReadReceipt>,
}

impl MessageView {
    #[inline]
    pub fn id(&self) -> Snowflake {
        self.message.id
    }

    pub fn is_read_by(&self, user_id: Snowflake) -> bool {
        self.receipts
            .iter()
            .any(|r| r.user_id == user_id && r.is_read())
    }
}

// ============================================================================
// Typing and uploads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypingView {
    pub user_id: Snowflake,
    pub started_at: DateTime<Utc>,
    pub profile: ProfileView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    pub message_id: Snowflake,
    pub attachment: Attachment,
    pub url: String,
}
