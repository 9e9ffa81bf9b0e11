//! Repository implementations
//!
//! PostgreSQL implementations of the store ports defined in convo-core.
//! Batch lookups bind the ID list as a single `BIGINT[]` and filter with
//! `= ANY($1)`.

mod attachment;
mod conversation;
mod error;
mod membership;
mod message;
mod profile;
mod reaction;
mod receipt;
mod typing;

pub use attachment::PgAttachmentRepository;
pub use error::map_db_error;
pub use conversation::PgConversationRepository;
pub use membership::PgMembershipRepository;
pub use message::PgMessageRepository;
pub use profile::PgProfileRepository;
pub use reaction::PgReactionRepository;
pub use receipt::PgReadReceiptRepository;
pub use typing::PgTypingRepository;
