//! Redis pub/sub listener feeding a local subscription registry

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use redis::Client;
use tokio::sync::mpsc;

use convo_core::events::{ChangeCallback, ChangeEvent, FeedRegistry, Subscription, SubscriptionHandle};
use convo_core::traits::{ChangeFeed, RepoResult};

use crate::pool::RedisResult;

use super::CHANGE_CHANNEL;

/// Listener configuration
#[derive(Debug, Clone)]
pub struct RedisFeedConfig {
    pub redis_url: String,
    pub channel: String,
    /// Delay before reconnecting after an error
    pub reconnect_delay: Duration,
}

impl Default for RedisFeedConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            channel: CHANGE_CHANNEL.to_string(),
            reconnect_delay: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug)]
enum FeedCommand {
    Shutdown,
}

/// Change feed fed by the Redis change channel
pub struct RedisChangeFeed {
    registry: Arc<FeedRegistry>,
    control_tx: mpsc::Sender<FeedCommand>,
}

impl RedisChangeFeed {
    /// Start the background listener; must be called inside a Tokio runtime
    pub fn start(config: RedisFeedConfig) -> Self {
        let registry = Arc::new(FeedRegistry::new());
        let (control_tx, control_rx) = mpsc::channel(4);

        tokio::spawn(Self::listener_loop(config, registry.clone(), control_rx));

        Self {
            registry,
            control_tx,
        }
    }

    /// Stop the background listener
    pub async fn shutdown(&self) {
        let _ = self.control_tx.send(FeedCommand::Shutdown).await;
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    async fn listener_loop(
        config: RedisFeedConfig,
        registry: Arc<FeedRegistry>,
        mut control_rx: mpsc::Receiver<FeedCommand>,
    ) {
        loop {
            match Self::run_listener(&config, &registry, &mut control_rx).await {
                Ok(true) => {
                    tracing::info!("Redis change feed shutting down");
                    break;
                }
                Ok(false) => {
                    tracing::warn!("Redis change stream ended, reconnecting");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Redis change feed error, reconnecting...");
                    tokio::time::sleep(config.reconnect_delay).await;
                }
            }
        }
    }

    /// Run until error or shutdown; `Ok(true)` means stop
    async fn run_listener(
        config: &RedisFeedConfig,
        registry: &FeedRegistry,
        control_rx: &mut mpsc::Receiver<FeedCommand>,
    ) -> RedisResult<bool> {
        let client = Client::open(config.redis_url.as_str())?;
        let mut pubsub = client.get_async_pubsub().await?;
        pubsub.subscribe(&config.channel).await?;

        tracing::info!(channel = %config.channel, "Redis change feed connected");

        let mut stream = pubsub.on_message();

        loop {
            tokio::select! {
                msg = stream.next() => {
                    let Some(msg) = msg else {
                        return Ok(false);
                    };
                    let payload: String = msg.get_payload().unwrap_or_default();
                    match decode_change(&payload) {
                        Some(event) => {
                            let delivered = registry.dispatch(&event);
                            tracing::trace!(table = %event.table, delivered, "Dispatched change");
                        }
                        None => tracing::warn!(payload = %payload, "Undecodable change payload"),
                    }
                }

                cmd = control_rx.recv() => {
                    match cmd {
                        Some(FeedCommand::Shutdown) | None => return Ok(true),
                    }
                }
            }
        }
    }
}

/// Parse a change envelope published by [`super::ChangePublisher`]
pub(crate) fn decode_change(payload: &str) -> Option<ChangeEvent> {
    serde_json::from_str(payload).ok()
}

impl ChangeFeed for RedisChangeFeed {
    fn subscribe(
        &self,
        subscription: Subscription,
        callback: ChangeCallback,
    ) -> RepoResult<SubscriptionHandle> {
        tracing::debug!(%subscription, "Subscribed to Redis change feed");
        Ok(self.registry.register(subscription, callback))
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.registry.remove(handle)
    }
}
