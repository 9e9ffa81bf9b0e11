//! Engine services
//!
//! Each service borrows a [`ServiceContext`] and performs one family of
//! operations against the store ports: aggregation, thread loading, the send
//! pipeline, typing presence, read state, and reconciliation.

pub mod context;
pub mod conversation;
pub mod error;
pub mod message;
pub mod read_state;
pub mod reconcile;
pub mod thread;
pub mod typing;

#[cfg(test)]
pub mod testing;

// Re-export all services for convenience
pub use context::{ReadKey, ServiceContext, ServiceContextBuilder};
pub use conversation::ConversationService;
pub use error::{ServiceError, ServiceResult};
pub use message::MessageService;
pub use read_state::ReadStateService;
pub use reconcile::{PendingRepair, ReconciliationService, RepairLog, SweepReport};
pub use thread::ThreadService;
pub use typing::{TypingService, TypingTimers};
