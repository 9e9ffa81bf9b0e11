//! Change feed that sends some tables to a different upstream
//!
//! Typing rows can live in Redis while everything else is in Postgres; the
//! engine still sees a single [`ChangeFeed`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use convo_core::traits::{ChangeFeed, RepoResult};
use convo_core::{ChangeCallback, Subscription, SubscriptionHandle, Table};
use parking_lot::Mutex;

pub struct RoutedChangeFeed {
    default: Arc<dyn ChangeFeed>,
    routes: HashMap<Table, Arc<dyn ChangeFeed>>,
    next_handle: AtomicU64,
    handles: Mutex<HashMap<SubscriptionHandle, (Option<Table>, SubscriptionHandle)>>,
}

impl RoutedChangeFeed {
    pub fn new(default: Arc<dyn ChangeFeed>) -> Self {
        Self {
            default,
            routes: HashMap::new(),
            next_handle: AtomicU64::new(0),
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Serve `table` from `feed`
    #[must_use]
    pub fn route(mut self, table: Table, feed: Arc<dyn ChangeFeed>) -> Self {
        self.routes.insert(table, feed);
        self
    }

    fn feed_for(&self, route: Option<Table>) -> &dyn ChangeFeed {
        route
            .and_then(|table| self.routes.get(&table))
            .map_or(self.default.as_ref(), |feed| feed.as_ref())
    }
}

impl ChangeFeed for RoutedChangeFeed {
    fn subscribe(&self, subscription: Subscription, callback: ChangeCallback) -> RepoResult<SubscriptionHandle> {
        let route = self
            .routes
            .contains_key(&subscription.table)
            .then_some(subscription.table);
        let inner = self.feed_for(route).subscribe(subscription, callback)?;

        let handle = SubscriptionHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed) + 1);
        self.handles.lock().insert(handle, (route, inner));
        Ok(handle)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let Some((route, inner)) = self.handles.lock().remove(&handle) else {
            return false;
        };
        self.feed_for(route).unsubscribe(inner)
    }
}

impl std::fmt::Debug for RoutedChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutedChangeFeed")
            .field("routes", &self.routes.keys().collect::<Vec<_>>())
            .field("subscriptions", &self.handles.lock().len())
            .finish_non_exhaustive()
    }
}
