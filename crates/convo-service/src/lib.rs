//! # convo-service
//!
//! The conversation engine: aggregation, thread loading, the send pipeline,
//! read state, typing presence, and realtime synchronization.
//!
//! Everything runs against the store ports in `convo-core`; [`wiring`]
//! connects the Postgres and Redis adapters, and tests use the in-memory
//! store from `convo-db`.

pub mod batch;
pub mod coalescer;
pub mod dto;
pub mod notify;
pub mod realtime;
pub mod services;
pub mod sessions;
pub mod visibility;
pub mod wiring;

pub use coalescer::{CoalesceError, Coalescer};
pub use notify::{CollectingNotifier, LoadScope, Notification, Notifier, TracingNotifier};
pub use realtime::{BindingTarget, BridgeBinding, InboxSynchronizer, RealtimeBridge, ReloadTrigger, RoutedChangeFeed};
pub use services::{
    ConversationService, MessageService, ReadStateService, ReconciliationService, ServiceContext,
    ServiceContextBuilder, ServiceError, ServiceResult, ThreadService, TypingService,
};
pub use sessions::{ConversationListSession, LoadState, ThreadSession, TypingSession};
pub use visibility::{ReadCallback, VisibilitySession, VisibilityTracker};
pub use wiring::{connect, connect_with_notifier};
