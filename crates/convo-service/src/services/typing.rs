//! Typing presence service
//!
//! `start_typing` upserts the (conversation, user) row and arms a local timer
//! that stops typing unless refreshed. Readers also sweep rows older than the
//! configured stale window, so a crashed client's row does not linger.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use convo_core::entities::{Profile, TypingIndicator};
use convo_core::Snowflake;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::batch;
use crate::dto::{ProfileView, TypingView};

use super::context::ServiceContext;
use super::error::ServiceResult;

type TimerKey = (Snowflake, Snowflake);

struct Timer {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Self-expiry timers, one per (conversation, user)
#[derive(Default)]
pub struct TypingTimers {
    timers: DashMap<TimerKey, Timer>,
    next_generation: AtomicU64,
}

impl TypingTimers {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn arm(&self, key: TimerKey, generation: u64, handle: JoinHandle<()>) {
        if let Some(previous) = self.timers.insert(key, Timer { generation, handle }) {
            previous.handle.abort();
        }
    }

    /// Cancel the timer; false if none was armed
    pub fn disarm(&self, conversation_id: Snowflake, user_id: Snowflake) -> bool {
        self.timers
            .remove(&(conversation_id, user_id))
            .map(|(_, timer)| timer.handle.abort())
            .is_some()
    }

    /// Called by the timer task itself; false if it was replaced meanwhile
    fn expire(&self, key: TimerKey, generation: u64) -> bool {
        self.timers
            .remove_if(&key, |_, timer| timer.generation == generation)
            .is_some()
    }

    pub fn is_armed(&self, conversation_id: Snowflake, user_id: Snowflake) -> bool {
        self.timers.contains_key(&(conversation_id, user_id))
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

/// Typing service
pub struct TypingService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> TypingService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Mark `user_id` as typing and (re)arm the self-expiry timer
    #[instrument(skip(self))]
    pub async fn start_typing(&self, conversation_id: Snowflake, user_id: Snowflake) -> ServiceResult<()> {
        let indicator = TypingIndicator::new(conversation_id, user_id);
        self.ctx.typing_repo().upsert(&indicator).await?;

        let key = (conversation_id, user_id);
        let timers = self.ctx.typing_timers();
        let generation = timers.next_generation();
        let timeout = self.ctx.config().typing.timeout;
        let ctx = self.ctx.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if !ctx.typing_timers().expire(key, generation) {
                return;
            }
            debug!(conversation_id = %conversation_id, user_id = %user_id, "Typing expired");
            if let Err(e) = ctx.typing_repo().delete(conversation_id, user_id).await {
                warn!(error = %e, conversation_id = %conversation_id, "Failed to clear expired typing row");
            }
        });
        timers.arm(key, generation, handle);
        Ok(())
    }

    /// Delete the typing row and disarm the timer; returns whether a row existed
    #[instrument(skip(self))]
    pub async fn stop_typing(&self, conversation_id: Snowflake, user_id: Snowflake) -> ServiceResult<bool> {
        self.ctx.typing_timers().disarm(conversation_id, user_id);
        Ok(self.ctx.typing_repo().delete(conversation_id, user_id).await?)
    }

    /// Users currently typing in a conversation, excluding `excluding_user`
    ///
    /// Entries without a profile are dropped. Oldest typist first.
    #[instrument(skip(self))]
    pub async fn list_typing(
        &self,
        conversation_id: Snowflake,
        excluding_user: Snowflake,
    ) -> ServiceResult<Vec<TypingView>> {
        let stale_after = self.ctx.config().typing.stale_after;
        let cutoff = if stale_after.is_zero() {
            None
        } else {
            chrono::Duration::from_std(stale_after)
                .ok()
                .map(|window| Utc::now() - window)
        };

        if let Some(cutoff) = cutoff {
            match self.ctx.typing_repo().delete_stale(conversation_id, cutoff).await {
                Ok(0) => {}
                Ok(swept) => debug!(swept, conversation_id = %conversation_id, "Swept stale typing rows"),
                Err(e) => warn!(error = %e, conversation_id = %conversation_id, "Typing sweep failed"),
            }
        }

        let mut rows: Vec<TypingIndicator> = self
            .ctx
            .typing_repo()
            .list(conversation_id)
            .await?
            .into_iter()
            .filter(|row| row.user_id != excluding_user)
            .filter(|row| cutoff.map_or(true, |cutoff| row.started_at >= cutoff))
            .collect();
        rows.sort_by_key(|row| (row.started_at, row.user_id));

        let profiles = batch::attach(
            rows.iter().map(|row| row.user_id).collect(),
            |ids| async move { self.ctx.profile_repo().find_by_ids(&ids).await },
            |profile: &Profile| profile.id,
        )
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let profile = profiles.first(&row.user_id)?;
                Some(TypingView {
                    user_id: row.user_id,
                    started_at: row.started_at,
                    profile: ProfileView::from(profile),
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{engine, ALICE, BOB, CAROL};
    use chrono::Duration as ChronoDuration;
    use convo_core::traits::TypingRepository;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_typing_expires_without_refresh() {
        let (ctx, store) = engine().await;
        let conv = store.seed_direct(ALICE, BOB).await;
        let typing = TypingService::new(&ctx);

        typing.start_typing(conv, ALICE).await.unwrap();
        assert_eq!(typing.list_typing(conv, BOB).await.unwrap().len(), 1);

        tokio::time::sleep(Duration::from_millis(3001)).await;
        assert!(typing.list_typing(conv, BOB).await.unwrap().is_empty());
        assert!(!ctx.typing_timers().is_armed(conv, ALICE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_extends_timer() {
        let (ctx, store) = engine().await;
        let conv = store.seed_direct(ALICE, BOB).await;
        let typing = TypingService::new(&ctx);

        typing.start_typing(conv, ALICE).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2000)).await;
        typing.start_typing(conv, ALICE).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(typing.list_typing(conv, BOB).await.unwrap().len(), 1);

        tokio::time::sleep(Duration::from_millis(1001)).await;
        assert!(typing.list_typing(conv, BOB).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_excludes_self_and_missing_profiles() {
        let (ctx, store) = engine().await;
        let conv = store.seed_group(ALICE, &[BOB, CAROL]).await;
        let ghost = Snowflake::new(999);
        let typing = TypingService::new(&ctx);

        typing.start_typing(conv, ALICE).await.unwrap();
        typing.start_typing(conv, BOB).await.unwrap();
        typing.start_typing(conv, ghost).await.unwrap();

        let list = typing.list_typing(conv, ALICE).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].user_id, BOB);
        assert_eq!(list[0].profile.label(), "Bob");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_typing_disarms() {
        let (ctx, store) = engine().await;
        let conv = store.seed_direct(ALICE, BOB).await;
        let typing = TypingService::new(&ctx);

        typing.start_typing(conv, ALICE).await.unwrap();
        assert!(typing.stop_typing(conv, ALICE).await.unwrap());
        assert!(ctx.typing_timers().is_empty());
        assert!(!typing.stop_typing(conv, ALICE).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_rows_are_swept_on_read() {
        let (ctx, store) = engine().await;
        let conv = store.seed_direct(ALICE, BOB).await;
        let mut crashed = TypingIndicator::new(conv, ALICE);
        crashed.started_at = Utc::now() - ChronoDuration::seconds(60);
        store.upsert(&crashed).await.unwrap();

        let list = TypingService::new(&ctx).list_typing(conv, BOB).await.unwrap();
        assert!(list.is_empty());
        assert!(store.typing_rows(conv).is_empty());
    }
}
