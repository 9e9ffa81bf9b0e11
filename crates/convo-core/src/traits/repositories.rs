//! Repository traits (ports) - the relational store as the engine sees it
//!
//! Every batch lookup takes an ID slice gathered from a previous query; the
//! engine joins in memory and never issues one query per row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::{
    Attachment, Conversation, DirectPair, Membership, Message, MessageStamp, Profile, Reaction,
    ReadReceipt, TypingIndicator,
};
use crate::error::DomainError;
use crate::value_objects::Snowflake;

/// Result type for repository operations
pub type RepoResult<T> = Result<T, DomainError>;

// ============================================================================
// Conversation Repository
// ============================================================================

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Conversation>>;

    /// Conversations by ID, ordered by last activity descending, nulls last
    async fn find_by_ids(&self, ids: &[Snowflake]) -> RepoResult<Vec<Conversation>>;

    async fn create(&self, conversation: &Conversation) -> RepoResult<()>;

    /// Conversation holding the direct pair, if any
    async fn find_direct(&self, pair: DirectPair) -> RepoResult<Option<Snowflake>>;

    /// Insert a direct conversation keyed by `pair` unless the pair already
    /// has one. Returns the id holding the pair afterwards, which is
    /// `conversation.id` only when this call created it.
    async fn create_direct(&self, conversation: &Conversation, pair: DirectPair) -> RepoResult<Snowflake>;

    /// Update name, description, avatar and archived flag
    async fn update(&self, conversation: &Conversation) -> RepoResult<()>;

    /// Move last activity forward to `at` (no-op if already later)
    async fn touch_last_message(&self, id: Snowflake, at: DateTime<Utc>) -> RepoResult<()>;
}

// ============================================================================
// Membership Repository (read-state store)
// ============================================================================

#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Memberships of one user
    async fn list_for_user(&self, user_id: Snowflake) -> RepoResult<Vec<Membership>>;

    /// Memberships of any user in the given conversations
    async fn list_for_conversations(
        &self,
        conversation_ids: &[Snowflake],
    ) -> RepoResult<Vec<Membership>>;

    async fn find(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
    ) -> RepoResult<Option<Membership>>;

    /// Insert members, leaving existing (conversation, user) rows untouched
    async fn upsert_many(&self, memberships: &[Membership]) -> RepoResult<()>;

    /// Returns false if the user was not a member
    async fn delete(&self, conversation_id: Snowflake, user_id: Snowflake) -> RepoResult<bool>;

    /// The only write path for read state. The mark is taken from the
    /// store's clock, the same one that stamps messages; `None` if the user
    /// is not a member.
    async fn set_last_read(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
    ) -> RepoResult<Option<DateTime<Utc>>>;

    async fn set_muted(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
        muted: bool,
    ) -> RepoResult<bool>;

    async fn set_pinned(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
        pinned: bool,
    ) -> RepoResult<bool>;
}

// ============================================================================
// Message Repository
// ============================================================================

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Message>>;

    /// Newest `limit` messages of a conversation (deleted ones included),
    /// newest first
    async fn find_latest(&self, conversation_id: Snowflake, limit: i64) -> RepoResult<Vec<Message>>;

    /// Non-deleted messages of the given conversations, newest first; at
    /// least the newest of each conversation is included
    async fn find_latest_per_conversation(
        &self,
        conversation_ids: &[Snowflake],
    ) -> RepoResult<Vec<Message>>;

    /// Non-deleted messages not sent by `excluding_sender`, created after
    /// `since` when given
    async fn find_unread_candidates(
        &self,
        conversation_ids: &[Snowflake],
        excluding_sender: Snowflake,
        since: Option<DateTime<Utc>>,
    ) -> RepoResult<Vec<MessageStamp>>;

    /// Insert a message; `created_at` and `updated_at` are assigned by the
    /// store and the row as stored is returned
    async fn create(&self, message: &Message) -> RepoResult<Message>;

    async fn update_content(
        &self,
        id: Snowflake,
        content: &str,
        edited_at: DateTime<Utc>,
    ) -> RepoResult<bool>;

    async fn soft_delete(&self, id: Snowflake, at: DateTime<Utc>) -> RepoResult<bool>;

    /// Soft-delete every message of a conversation; returns rows touched
    async fn soft_delete_conversation(
        &self,
        conversation_id: Snowflake,
        at: DateTime<Utc>,
    ) -> RepoResult<u64>;

    async fn ids_for_conversation(&self, conversation_id: Snowflake) -> RepoResult<Vec<Snowflake>>;

    /// Creation time of the newest message, deleted or not
    async fn latest_created_at(&self, conversation_id: Snowflake)
        -> RepoResult<Option<DateTime<Utc>>>;
}

// ============================================================================
// Attachment Repository
// ============================================================================

#[async_trait]
pub trait AttachmentRepository: Send + Sync {
    async fn find_by_messages(&self, message_ids: &[Snowflake]) -> RepoResult<Vec<Attachment>>;

    async fn create(&self, attachment: &Attachment) -> RepoResult<()>;

    /// Hard delete; returns rows removed
    async fn delete_by_messages(&self, message_ids: &[Snowflake]) -> RepoResult<u64>;
}

// ============================================================================
// Reaction Repository
// ============================================================================

#[async_trait]
pub trait ReactionRepository: Send + Sync {
    async fn find_by_messages(&self, message_ids: &[Snowflake]) -> RepoResult<Vec<Reaction>>;

    /// Idempotent; returns false if the triple already existed
    async fn add(&self, reaction: &Reaction) -> RepoResult<bool>;

    async fn remove(&self, message_id: Snowflake, user_id: Snowflake, emoji: &str)
        -> RepoResult<bool>;
}

// ============================================================================
// Read Receipt Repository
// ============================================================================

#[async_trait]
pub trait ReadReceiptRepository: Send + Sync {
    async fn find_by_messages(&self, message_ids: &[Snowflake]) -> RepoResult<Vec<ReadReceipt>>;

    /// Insert a delivered-only receipt unless one exists
    async fn record_delivered(
        &self,
        message_id: Snowflake,
        user_id: Snowflake,
        at: DateTime<Utc>,
    ) -> RepoResult<()>;

    /// Insert a read receipt, or set `read_at` on an existing one where it is null
    async fn record_read(
        &self,
        message_id: Snowflake,
        user_id: Snowflake,
        at: DateTime<Utc>,
    ) -> RepoResult<()>;
}

// ============================================================================
// Typing Repository
// ============================================================================

#[async_trait]
pub trait TypingRepository: Send + Sync {
    /// Insert or overwrite on (conversation, user)
    async fn upsert(&self, indicator: &TypingIndicator) -> RepoResult<()>;

    async fn delete(&self, conversation_id: Snowflake, user_id: Snowflake) -> RepoResult<bool>;

    async fn list(&self, conversation_id: Snowflake) -> RepoResult<Vec<TypingIndicator>>;

    /// Delete rows started before `before`; returns rows removed
    async fn delete_stale(&self, conversation_id: Snowflake, before: DateTime<Utc>) -> RepoResult<u64>;
}

// ============================================================================
// Profile Repository (collaborator)
// ============================================================================

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Profiles for the given users; unknown IDs are skipped
    async fn find_by_ids(&self, ids: &[Snowflake]) -> RepoResult<Vec<Profile>>;
}
