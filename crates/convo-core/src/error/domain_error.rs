//! Domain errors - error types for the domain layer

use thiserror::Error;

use crate::value_objects::Snowflake;

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // Not Found Errors
    // =========================================================================
    #[error("Conversation not found: {0}")]
    ConversationNotFound(Snowflake),

    #[error("Message not found: {0}")]
    MessageNotFound(Snowflake),

    #[error("User {user_id} is not a member of conversation {conversation_id}")]
    MembershipNotFound {
        conversation_id: Snowflake,
        user_id: Snowflake,
    },

    #[error("Profile not found: {0}")]
    ProfileNotFound(Snowflake),

    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Message content is empty")]
    EmptyContent,

    #[error("Content too long: max {max} characters")]
    ContentTooLong { max: usize },

    #[error("File too large: max {max} bytes")]
    FileTooLarge { max: u64 },

    #[error("Conversation id is required")]
    MissingConversationId,

    // =========================================================================
    // Authorization Errors
    // =========================================================================
    #[error("Not a member of this conversation")]
    NotConversationMember,

    #[error("Not message author")]
    NotMessageAuthor,

    // =========================================================================
    // Conflict Errors
    // =========================================================================
    #[error("Already a member of this conversation")]
    AlreadyMember,

    // =========================================================================
    // Business Rule Violations
    // =========================================================================
    #[error("A direct conversation needs exactly two distinct participants")]
    InvalidDirectParticipants,

    #[error("Cannot modify a deleted message")]
    MessageDeleted,

    // =========================================================================
    // Infrastructure Errors (wrapped)
    // =========================================================================
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Change feed error: {0}")]
    FeedError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DomainError {
    /// Stable error code for logs and notifications
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConversationNotFound(_) => "UNKNOWN_CONVERSATION",
            Self::MessageNotFound(_) => "UNKNOWN_MESSAGE",
            Self::MembershipNotFound { .. } => "UNKNOWN_MEMBERSHIP",
            Self::ProfileNotFound(_) => "UNKNOWN_PROFILE",

            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::EmptyContent => "EMPTY_CONTENT",
            Self::ContentTooLong { .. } => "CONTENT_TOO_LONG",
            Self::FileTooLarge { .. } => "FILE_TOO_LARGE",
            Self::MissingConversationId => "MISSING_CONVERSATION_ID",

            Self::NotConversationMember => "NOT_CONVERSATION_MEMBER",
            Self::NotMessageAuthor => "NOT_MESSAGE_AUTHOR",

            Self::AlreadyMember => "ALREADY_MEMBER",

            Self::InvalidDirectParticipants => "INVALID_DIRECT_PARTICIPANTS",
            Self::MessageDeleted => "MESSAGE_DELETED",

            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::CacheError(_) => "CACHE_ERROR",
            Self::StorageError(_) => "STORAGE_ERROR",
            Self::FeedError(_) => "FEED_ERROR",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ConversationNotFound(_)
                | Self::MessageNotFound(_)
                | Self::MembershipNotFound { .. }
                | Self::ProfileNotFound(_)
        )
    }

    /// Validation errors are raised before any store call is made
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::ValidationError(_)
                | Self::EmptyContent
                | Self::ContentTooLong { .. }
                | Self::FileTooLarge { .. }
                | Self::MissingConversationId
                | Self::InvalidDirectParticipants
        )
    }

    pub fn is_authorization(&self) -> bool {
        matches!(self, Self::NotConversationMember | Self::NotMessageAuthor)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::AlreadyMember | Self::MessageDeleted)
    }

    /// Store, cache, blob or feed unavailable
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::DatabaseError(_)
                | Self::CacheError(_)
                | Self::StorageError(_)
                | Self::FeedError(_)
                | Self::InternalError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            DomainError::ConversationNotFound(Snowflake::new(1)).code(),
            "UNKNOWN_CONVERSATION"
        );
        assert_eq!(DomainError::EmptyContent.code(), "EMPTY_CONTENT");
        assert_eq!(
            DomainError::StorageError("down".into()).code(),
            "STORAGE_ERROR"
        );
    }

    #[test]
    fn test_categories() {
        assert!(DomainError::MessageNotFound(Snowflake::new(1)).is_not_found());
        assert!(DomainError::FileTooLarge { max: 10 }.is_validation());
        assert!(DomainError::NotMessageAuthor.is_authorization());
        assert!(DomainError::DatabaseError("x".into()).is_infrastructure());
        assert!(!DomainError::EmptyContent.is_infrastructure());
    }

    #[test]
    fn test_error_display() {
        let err = DomainError::MembershipNotFound {
            conversation_id: Snowflake::new(7),
            user_id: Snowflake::new(9),
        };
        assert_eq!(err.to_string(), "User 9 is not a member of conversation 7");

        let err = DomainError::ContentTooLong { max: 4000 };
        assert_eq!(err.to_string(), "Content too long: max 4000 characters");
    }
}
