//! In-process change feed

use convo_core::events::{ChangeCallback, ChangeEvent, FeedRegistry, Subscription, SubscriptionHandle};
use convo_core::traits::{ChangeFeed, RepoResult};

/// Change feed whose events are published directly by the writer
#[derive(Default)]
pub struct MemoryChangeFeed {
    registry: FeedRegistry,
}

impl MemoryChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to every matching subscriber; returns how many ran
    pub fn publish(&self, event: &ChangeEvent) -> usize {
        let delivered = self.registry.dispatch(event);
        tracing::trace!(table = %event.table, kind = ?event.kind, delivered, "Published change");
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }
}

impl ChangeFeed for MemoryChangeFeed {
    fn subscribe(
        &self,
        subscription: Subscription,
        callback: ChangeCallback,
    ) -> RepoResult<SubscriptionHandle> {
        tracing::debug!(%subscription, "Subscribed");
        Ok(self.registry.register(subscription, callback))
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.registry.remove(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use convo_core::events::{ChangeKind, Table};
    use serde_json::json;

    #[test]
    fn test_publish_reaches_filtered_subscriber_only() {
        let feed = MemoryChangeFeed::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        let handle = feed
            .subscribe(
                Subscription::table(Table::Messages).filter_eq("conversation_id", 7),
                Arc::new(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        let matching = ChangeEvent::new(Table::Messages, ChangeKind::Insert, json!({"conversation_id": "7"}));
        let other = ChangeEvent::new(Table::Messages, ChangeKind::Insert, json!({"conversation_id": "8"}));
        assert_eq!(feed.publish(&matching), 1);
        assert_eq!(feed.publish(&other), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(feed.unsubscribe(handle));
        assert!(!feed.unsubscribe(handle));
        assert_eq!(feed.publish(&matching), 0);
    }
}
