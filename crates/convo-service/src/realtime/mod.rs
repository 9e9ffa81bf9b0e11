//! Realtime synchronization
//!
//! Change-feed bindings that re-run loaders, the reload trigger that bounds
//! reload bursts, table routing across feeds, and the inbox synchronizer.

mod bridge;
mod inbox;
mod routed;
mod trigger;

pub use bridge::{BindingTarget, BridgeBinding, RealtimeBridge};
pub use inbox::InboxSynchronizer;
pub use routed::RoutedChangeFeed;
pub use trigger::ReloadTrigger;
