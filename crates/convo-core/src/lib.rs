//! # convo-core
//!
//! Domain layer for the conversation synchronization engine: entities, the
//! `Snowflake` identifier, domain errors, the change-event model shared by every
//! change feed, and the ports (repository and collaborator traits) the engine
//! consumes. Nothing here knows about Postgres, Redis, or a runtime.

pub mod entities;
pub mod error;
pub mod events;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    Attachment, Conversation, ConversationKind, DirectPair, MemberRole, Membership, Message, MessageStamp,
    MessageType, Profile, Reaction, ReactionCount, ReadReceipt, TypingIndicator,
};
pub use error::DomainError;
pub use events::{
    ChangeCallback, ChangeEvent, ChangeFilter, ChangeKind, EventMask, FeedRegistry, Subscription,
    SubscriptionHandle, Table,
};
pub use traits::{
    AttachmentRepository, BlobStore, ChangeFeed, ConversationRepository, MembershipRepository,
    MessageRepository, ProfileRepository, ReactionRepository, ReadReceiptRepository, RepoResult,
    TypingRepository,
};
pub use value_objects::{Snowflake, SnowflakeGenerator, SnowflakeParseError};
