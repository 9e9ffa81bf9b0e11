//! Database models - SQLx-compatible structs for PostgreSQL tables

mod conversation;
mod membership;
mod message;
mod profile;
mod reaction;
mod receipt;
mod typing;

pub use conversation::ConversationModel;
pub use membership::MembershipModel;
pub use message::{AttachmentModel, MessageModel, MessageStampModel};
pub use profile::ProfileModel;
pub use reaction::ReactionModel;
pub use receipt::ReadReceiptModel;
pub use typing::TypingIndicatorModel;
