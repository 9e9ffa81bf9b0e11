//! Domain entities - rows of the conversation store and the profile collaborator

mod conversation;
mod membership;
mod message;
mod profile;
mod reaction;
mod receipt;
mod typing;

pub use conversation::{Conversation, ConversationKind, DirectPair};
pub use membership::{MemberRole, Membership};
pub use message::{Attachment, Message, MessageStamp, MessageType};
pub use profile::Profile;
pub use reaction::{Reaction, ReactionCount};
pub use receipt::ReadReceipt;
pub use typing::TypingIndicator;
