//! PostgreSQL change feed
//!
//! Table triggers (see `migrations/`) publish a JSON envelope on the
//! `convo_changes` channel. One background listener per feed receives them and
//! fans out to local subscribers through a [`FeedRegistry`].

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio::sync::mpsc;

use convo_core::events::{ChangeCallback, ChangeEvent, FeedRegistry, Subscription, SubscriptionHandle};
use convo_core::traits::{ChangeFeed, RepoResult};

/// NOTIFY channel written by the table triggers
pub const CHANGE_CHANNEL: &str = "convo_changes";

/// Listener configuration
#[derive(Debug, Clone)]
pub struct PgFeedConfig {
    pub channel: String,
    /// Delay before reconnecting after a listener error
    pub reconnect_delay: Duration,
}

impl Default for PgFeedConfig {
    fn default() -> Self {
        Self {
            channel: CHANGE_CHANNEL.to_string(),
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug)]
enum FeedCommand {
    Shutdown,
}

/// Change feed fed by Postgres notifications
pub struct PgChangeFeed {
    registry: Arc<FeedRegistry>,
    control_tx: mpsc::Sender<FeedCommand>,
}

impl PgChangeFeed {
    /// Start the background listener; must be called inside a Tokio runtime
    pub fn start(pool: PgPool, config: PgFeedConfig) -> Self {
        let registry = Arc::new(FeedRegistry::new());
        let (control_tx, control_rx) = mpsc::channel(4);

        tokio::spawn(Self::listener_loop(pool, config, registry.clone(), control_rx));

        Self {
            registry,
            control_tx,
        }
    }

    /// Stop the listener; subscriptions stay registered but receive nothing
    pub async fn shutdown(&self) {
        let _ = self.control_tx.send(FeedCommand::Shutdown).await;
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    async fn listener_loop(
        pool: PgPool,
        config: PgFeedConfig,
        registry: Arc<FeedRegistry>,
        mut control_rx: mpsc::Receiver<FeedCommand>,
    ) {
        loop {
            match Self::run_listener(&pool, &config, &registry, &mut control_rx).await {
                Ok(()) => {
                    tracing::info!("Change feed listener shutting down");
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Change feed listener error, reconnecting...");
                    tokio::time::sleep(config.reconnect_delay).await;
                }
            }
        }
    }

    /// Run until shutdown (`Ok`) or a listener error (`Err`)
    async fn run_listener(
        pool: &PgPool,
        config: &PgFeedConfig,
        registry: &FeedRegistry,
        control_rx: &mut mpsc::Receiver<FeedCommand>,
    ) -> Result<(), sqlx::Error> {
        let mut listener = PgListener::connect_with(pool).await?;
        listener.listen(&config.channel).await?;

        tracing::info!(channel = %config.channel, "Change feed listening");

        loop {
            tokio::select! {
                notification = listener.recv() => {
                    let notification = notification?;
                    if let Some(event) = decode_notification(notification.payload()) {
                        let delivered = registry.dispatch(&event);
                        tracing::trace!(
                            table = %event.table,
                            kind = ?event.kind,
                            delivered,
                            "Change event dispatched"
                        );
                    }
                }

                cmd = control_rx.recv() => {
                    match cmd {
                        Some(FeedCommand::Shutdown) | None => return Ok(()),
                    }
                }
            }
        }
    }
}

/// Parse a NOTIFY payload; malformed payloads are logged and dropped
pub fn decode_notification(payload: &str) -> Option<ChangeEvent> {
    match serde_json::from_str::<ChangeEvent>(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring malformed change notification");
            None
        }
    }
}

impl ChangeFeed for PgChangeFeed {
    fn subscribe(
        &self,
        subscription: Subscription,
        callback: ChangeCallback,
    ) -> RepoResult<SubscriptionHandle> {
        tracing::debug!(subscription = %subscription, "Subscribing to change feed");
        Ok(self.registry.register(subscription, callback))
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.registry.remove(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convo_core::events::{ChangeKind, Table};

    #[test]
    fn test_decode_trigger_payload() {
        let payload = r#"{"table":"conversation_members","kind":"UPDATE",
            "record":{"conversation_id":10,"user_id":20,"last_read_at":null}}"#;
        let event = decode_notification(payload).unwrap();
        assert_eq!(event.table, Table::ConversationMembers);
        assert_eq!(event.kind, ChangeKind::Update);
        assert_eq!(event.field("user_id").as_deref(), Some("20"));
    }

    #[test]
    fn test_decode_rejects_unknown_table() {
        assert!(decode_notification(r#"{"table":"users","kind":"INSERT","record":{}}"#).is_none());
        assert!(decode_notification("not json").is_none());
    }
}
