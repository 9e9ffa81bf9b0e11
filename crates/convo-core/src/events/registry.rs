//! Feed registry - local fan-out of change events to subscribers
//!
//! Feed adapters own one upstream connection and keep their subscribers here.
//! Callbacks are cloned out of the lock before they run, so a callback may
//! subscribe or unsubscribe without deadlocking.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::change::{ChangeCallback, ChangeEvent, Subscription, SubscriptionHandle, Table};

struct Entry {
    subscription: Subscription,
    callback: ChangeCallback,
}

#[derive(Default)]
pub struct FeedRegistry {
    next_id: AtomicU64,
    entries: RwLock<HashMap<SubscriptionHandle, Entry>>,
}

impl FeedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, subscription: Subscription, callback: ChangeCallback) -> SubscriptionHandle {
        let handle = SubscriptionHandle::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.entries.write().insert(
            handle,
            Entry {
                subscription,
                callback,
            },
        );
        handle
    }

    /// Remove a subscription; returns false if it was already gone
    pub fn remove(&self, handle: SubscriptionHandle) -> bool {
        self.entries.write().remove(&handle).is_some()
    }

    /// Invoke every matching callback, returning how many ran
    pub fn dispatch(&self, event: &ChangeEvent) -> usize {
        let targets: Vec<ChangeCallback> = self
            .entries
            .read()
            .values()
            .filter(|entry| entry.subscription.matches(event))
            .map(|entry| entry.callback.clone())
            .collect();

        for callback in &targets {
            callback(event);
        }
        targets.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Tables with at least one live subscription
    pub fn tables(&self) -> HashSet<Table> {
        self.entries
            .read()
            .values()
            .map(|entry| entry.subscription.table)
            .collect()
    }
}

impl std::fmt::Debug for FeedRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedRegistry")
            .field("subscriptions", &self.len())
            .finish()
    }
}
