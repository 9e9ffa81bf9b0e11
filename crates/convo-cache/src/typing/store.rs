//! Redis-backed typing repository
//!
//! Each typing user is one key `typing:{conversation}:{user}` holding the
//! JSON row with a TTL, so a client that never sends "stop" disappears on its
//! own. A per-conversation set `typing:{conversation}:users` indexes the keys;
//! entries whose key has expired are pruned when the set is read.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use serde_json::json;
use tracing::instrument;

use convo_core::entities::TypingIndicator;
use convo_core::error::DomainError;
use convo_core::events::{ChangeEvent, ChangeKind, Table};
use convo_core::traits::{RepoResult, TypingRepository};
use convo_core::value_objects::Snowflake;

use crate::feed::ChangePublisher;
use crate::pool::{RedisPool, RedisPoolError};

/// Key prefix for typing indicators
const TYPING_PREFIX: &str = "typing:";

/// Default row lifetime (10 seconds)
pub const DEFAULT_TYPING_TTL_SECS: u64 = 10;

#[derive(Clone)]
pub struct RedisTypingStore {
    pool: RedisPool,
    publisher: ChangePublisher,
    ttl_secs: u64,
}

impl RedisTypingStore {
    pub fn new(pool: RedisPool, publisher: ChangePublisher) -> Self {
        Self {
            pool,
            publisher,
            ttl_secs: DEFAULT_TYPING_TTL_SECS,
        }
    }

    /// Override the row lifetime; zero is raised to one second
    #[must_use]
    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs.max(1);
        self
    }

    fn row_key(conversation_id: Snowflake, user_id: Snowflake) -> String {
        format!("{TYPING_PREFIX}{conversation_id}:{user_id}")
    }

    fn index_key(conversation_id: Snowflake) -> String {
        format!("{TYPING_PREFIX}{conversation_id}:users")
    }

    /// Announce a change; a lost announcement only delays peers until their next reload
    async fn announce(&self, event: ChangeEvent) {
        if let Err(e) = self.publisher.publish(&event).await {
            tracing::warn!(error = %e, "Failed to publish typing change");
        }
    }
}

#[async_trait]
impl TypingRepository for RedisTypingStore {
    #[instrument(skip(self, indicator), fields(conversation_id = %indicator.conversation_id, user_id = %indicator.user_id))]
    async fn upsert(&self, indicator: &TypingIndicator) -> RepoResult<()> {
        let row_key = Self::row_key(indicator.conversation_id, indicator.user_id);
        let index_key = Self::index_key(indicator.conversation_id);
        let payload = serde_json::to_string(indicator)
            .map_err(|e| DomainError::CacheError(e.to_string()))?;

        let mut conn = self.pool.get().await?;
        redis::pipe()
            .atomic()
            .set_ex(&row_key, &payload, self.ttl_secs)
            .ignore()
            .sadd(&index_key, indicator.user_id.to_string())
            .ignore()
            .expire(&index_key, i64::try_from(self.ttl_secs).unwrap_or(i64::MAX))
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(RedisPoolError::from)?;

        tracing::trace!("Set typing indicator");
        self.announce(ChangeEvent::from_row(Table::TypingIndicators, ChangeKind::Insert, indicator))
            .await;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, conversation_id: Snowflake, user_id: Snowflake) -> RepoResult<bool> {
        let mut conn = self.pool.get().await?;
        let previous: Option<String> = conn
            .get_del(Self::row_key(conversation_id, user_id))
            .await
            .map_err(RedisPoolError::from)?;
        let _: i64 = conn
            .srem(Self::index_key(conversation_id), user_id.to_string())
            .await
            .map_err(RedisPoolError::from)?;

        let Some(previous) = previous else {
            return Ok(false);
        };
        let record = serde_json::from_str(&previous).unwrap_or_else(|_| {
            json!({
                "conversation_id": conversation_id.to_string(),
                "user_id": user_id.to_string(),
            })
        });
        self.announce(ChangeEvent::new(Table::TypingIndicators, ChangeKind::Delete, record))
            .await;
        Ok(true)
    }

    #[instrument(skip(self))]
    async fn list(&self, conversation_id: Snowflake) -> RepoResult<Vec<TypingIndicator>> {
        let index_key = Self::index_key(conversation_id);
        let mut conn = self.pool.get().await?;

        let users: Vec<String> = conn
            .smembers(&index_key)
            .await
            .map_err(RedisPoolError::from)?;
        if users.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = users
            .iter()
            .map(|user| format!("{TYPING_PREFIX}{conversation_id}:{user}"))
            .collect();
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .map_err(RedisPoolError::from)?;

        let mut rows = Vec::with_capacity(values.len());
        let mut expired = Vec::new();
        for (user, value) in users.iter().zip(values) {
            match value.and_then(|v| serde_json::from_str::<TypingIndicator>(&v).ok()) {
                Some(row) => rows.push(row),
                None => expired.push(user.clone()),
            }
        }

        if !expired.is_empty() {
            let _: i64 = conn
                .srem(&index_key, &expired)
                .await
                .map_err(RedisPoolError::from)?;
        }

        rows.sort_by_key(|row| row.started_at);
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn delete_stale(
        &self,
        conversation_id: Snowflake,
        before: DateTime<Utc>,
    ) -> RepoResult<u64> {
        let mut removed = 0;
        for row in self.list(conversation_id).await? {
            if row.started_at < before && self.delete(conversation_id, row.user_id).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let conv = Snowflake::new(42);
        let user = Snowflake::new(7);
        assert_eq!(RedisTypingStore::row_key(conv, user), "typing:42:7");
        assert_eq!(RedisTypingStore::index_key(conv), "typing:42:users");
    }
}
