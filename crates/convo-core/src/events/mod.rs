//! Change events and the in-process subscription registry shared by all feeds

mod change;
mod registry;

pub use change::{
    ChangeCallback, ChangeEvent, ChangeFilter, ChangeKind, EventMask, Subscription,
    SubscriptionHandle, Table,
};
pub use registry::FeedRegistry;
