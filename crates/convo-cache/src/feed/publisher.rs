//! Publishes change envelopes on the Redis change channel

use redis::AsyncCommands;

use convo_core::events::ChangeEvent;

use crate::pool::{RedisPool, RedisResult};

use super::CHANGE_CHANNEL;

#[derive(Clone)]
pub struct ChangePublisher {
    pool: RedisPool,
    channel: String,
}

impl ChangePublisher {
    #[must_use]
    pub fn new(pool: RedisPool) -> Self {
        Self::with_channel(pool, CHANGE_CHANNEL)
    }

    #[must_use]
    pub fn with_channel(pool: RedisPool, channel: impl Into<String>) -> Self {
        Self {
            pool,
            channel: channel.into(),
        }
    }

    /// Publish one event; returns how many Redis subscribers received it
    pub async fn publish(&self, event: &ChangeEvent) -> RedisResult<u32> {
        let payload = serde_json::to_string(event)?;
        let mut conn = self.pool.get().await?;
        let receivers: u32 = conn.publish(&self.channel, &payload).await?;

        tracing::debug!(
            channel = %self.channel,
            table = %event.table,
            kind = ?event.kind,
            receivers,
            "Published change"
        );

        Ok(receivers)
    }
}
