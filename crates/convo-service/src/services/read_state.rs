//! Read-state service
//!
//! The membership row's `last_read_at` is the only read state; this service is
//! its only writer.

use chrono::{DateTime, Utc};
use convo_core::{DomainError, Snowflake};
use tracing::{debug, info, instrument};

use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};

/// Read-state service
pub struct ReadStateService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ReadStateService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Set the member's last-read mark to the store's now
    #[instrument(skip(self))]
    pub async fn mark_read(&self, conversation_id: Snowflake, user_id: Snowflake) -> ServiceResult<DateTime<Utc>> {
        let at = self
            .ctx
            .membership_repo()
            .set_last_read(conversation_id, user_id)
            .await?
            .ok_or(DomainError::NotConversationMember)?;

        info!(conversation_id = %conversation_id, user_id = %user_id, "Conversation marked read");
        Ok(at)
    }

    /// Mark read through the shared coalescer
    ///
    /// Calls for the same (conversation, user) inside the debounce window
    /// collapse into one write; the earlier callers get `Superseded`.
    #[instrument(skip(self))]
    pub async fn mark_read_debounced(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
    ) -> ServiceResult<DateTime<Utc>> {
        let result = self
            .ctx
            .read_coalescer()
            .schedule((conversation_id, user_id), self.mark_read(conversation_id, user_id))
            .await
            .map_err(ServiceError::from);

        if let Err(e) = &result {
            if e.is_superseded() {
                debug!(conversation_id = %conversation_id, "Read mark coalesced");
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{engine, ALICE, BOB, CAROL};
    use convo_core::Table;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_mark_read_sets_last_read() {
        let (ctx, store) = engine().await;
        let conv = store.seed_direct(ALICE, BOB).await;

        let at = ReadStateService::new(&ctx).mark_read(conv, BOB).await.unwrap();
        assert_eq!(store.membership(conv, BOB).unwrap().last_read_at, Some(at));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mark_read_rejects_non_member() {
        let (ctx, store) = engine().await;
        let conv = store.seed_direct(ALICE, BOB).await;

        let err = ReadStateService::new(&ctx).mark_read(conv, CAROL).await.unwrap_err();
        assert_eq!(err.error_code(), "NOT_CONVERSATION_MEMBER");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_marks_write_once() {
        let (ctx, store) = engine().await;
        let conv = store.seed_direct(ALICE, BOB).await;
        store.reset_counters();

        let first = tokio::spawn({
            let ctx = ctx.clone();
            async move { ReadStateService::new(&ctx).mark_read_debounced(conv, BOB).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = ReadStateService::new(&ctx).mark_read_debounced(conv, BOB).await;

        assert!(first.await.unwrap().unwrap_err().is_superseded());
        assert!(second.is_ok());
        assert_eq!(store.write_count(Table::ConversationMembers), 1);
    }
}
