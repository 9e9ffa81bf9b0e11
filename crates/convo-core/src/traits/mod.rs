//! Ports consumed by the engine: the relational store (repositories), the
//! change feed, and the blob store

mod collaborators;
mod repositories;

pub use collaborators::{BlobStore, ChangeFeed};
pub use repositories::{
    AttachmentRepository, ConversationRepository, MembershipRepository, MessageRepository,
    ProfileRepository, ReactionRepository, ReadReceiptRepository, RepoResult, TypingRepository,
};
