use std::sync::Arc;

use convo_core::Snowflake;
use tracing::{debug, instrument, warn};

use crate::dto::MessageView;
use crate::notify::LoadScope;
use crate::services::{ReadStateService, ServiceContext, ThreadService};
use crate::visibility::ReadCallback;

use super::{LoadSlot, LoadState};

/// The open thread of one conversation, as seen by one member
#[derive(Clone)]
pub struct ThreadSession {
    ctx: ServiceContext,
    conversation_id: Snowflake,
    viewer_id: Snowflake,
    slot: Arc<LoadSlot<MessageView>>,
}

impl ThreadSession {
    pub fn new(ctx: ServiceContext, conversation_id: Snowflake, viewer_id: Snowflake) -> Self {
        Self {
            ctx,
            conversation_id,
            viewer_id,
            slot: Arc::new(LoadSlot::new()),
        }
    }

    pub fn conversation_id(&self) -> Snowflake {
        self.conversation_id
    }

    /// Reload the whole window
    #[instrument(skip(self), fields(conversation_id = %self.conversation_id))]
    pub async fn reload(&self) {
        let generation = self.slot.begin();
        let result = ThreadService::new(&self.ctx)
            .load_messages(self.conversation_id, self.viewer_id)
            .await;
        self.slot.finish(
            generation,
            result,
            LoadScope::Thread(self.conversation_id),
            self.ctx.notifier(),
        );
    }

    /// Append a freshly inserted message without reloading
    ///
    /// Only applies when the message belongs here and sorts after the current
    /// tail; anything else falls back to a full reload. Returns whether the
    /// fast path was taken.
    #[instrument(skip(self), fields(conversation_id = %self.conversation_id))]
    pub async fn append_live(&self, message_id: Snowflake) -> bool {
        let loaded = ThreadService::new(&self.ctx)
            .load_message(message_id, self.viewer_id)
            .await;

        let view = match loaded {
            Ok(Some(view)) if view.message.conversation_id == self.conversation_id => view,
            Ok(_) => {
                debug!(message_id = %message_id, "Live message not appendable");
                self.reload().await;
                return false;
            }
            Err(e) => {
                warn!(error = %e, message_id = %message_id, "Live append failed, reloading");
                self.reload().await;
                return false;
            }
        };

        let page_size = self.ctx.config().thread.page_size as usize;
        let appended = self.slot.with_state_mut(|state| {
            let after_tail = state
                .items
                .last()
                .map_or(true, |tail| view.message.order_key() > tail.message.order_key());
            if !state.loaded_once || !after_tail {
                return false;
            }
            state.items.push(view);
            if state.items.len() > page_size {
                let excess = state.items.len() - page_size;
                state.items.drain(..excess);
            }
            true
        });

        if !appended {
            self.reload().await;
        }
        appended
    }

    /// Callback for a visibility session: marks this thread read, debounced
    pub fn read_marker(&self) -> ReadCallback {
        let ctx = self.ctx.clone();
        let viewer_id = self.viewer_id;
        Arc::new(move |conversation_id| {
            let ctx = ctx.clone();
            let Ok(handle) = tokio::runtime::Handle::try_current() else {
                warn!(conversation_id = %conversation_id, "No runtime to mark read on");
                return;
            };
            handle.spawn(async move {
                if let Err(e) = ReadStateService::new(&ctx)
                    .mark_read_debounced(conversation_id, viewer_id)
                    .await
                {
                    if !e.is_superseded() {
                        warn!(error = %e, conversation_id = %conversation_id, "Mark read failed");
                    }
                }
            });
        })
    }

    pub fn state(&self) -> LoadState<MessageView> {
        self.slot.snapshot()
    }

    pub fn messages(&self) -> Vec<MessageView> {
        self.slot.snapshot().items
    }

    pub fn dismiss_error(&self) {
        self.slot.dismiss_error();
    }
}

impl std::fmt::Debug for ThreadSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadSession")
            .field("conversation_id", &self.conversation_id)
            .field("viewer_id", &self.viewer_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::SendMessageRequest;
    use crate::services::testing::{engine, ALICE, BOB};
    use crate::services::MessageService;
    use convo_core::Table;
    use convo_db::FailPoint;

    #[tokio::test]
    async fn test_append_live_takes_fast_path() {
        let (ctx, store) = engine().await;
        let conv = store.seed_direct(ALICE, BOB).await;
        let messages = MessageService::new(&ctx);
        messages
            .send_message(SendMessageRequest::text(conv, ALICE, "one"))
            .await
            .unwrap();

        let session = ThreadSession::new(ctx.clone(), conv, BOB);
        session.reload().await;
        let two = messages
            .send_message(SendMessageRequest::text(conv, ALICE, "two"))
            .await
            .unwrap();

        store.reset_counters();
        assert!(session.append_live(two.id).await);
        assert_eq!(session.messages().len(), 2);
        // Only the single-message lookup ran, no window reload
        assert_eq!(store.read_count(Table::ConversationMembers), 0);
    }

    #[tokio::test]
    async fn test_append_live_before_first_load_reloads() {
        let (ctx, store) = engine().await;
        let conv = store.seed_direct(ALICE, BOB).await;
        let message = MessageService::new(&ctx)
            .send_message(SendMessageRequest::text(conv, ALICE, "one"))
            .await
            .unwrap();

        let session = ThreadSession::new(ctx, conv, BOB);
        assert!(!session.append_live(message.id).await);
        assert_eq!(session.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_reload_empties_thread() {
        let (ctx, store) = engine().await;
        let conv = store.seed_direct(ALICE, BOB).await;
        MessageService::new(&ctx)
            .send_message(SendMessageRequest::text(conv, ALICE, "one"))
            .await
            .unwrap();
        let session = ThreadSession::new(ctx, conv, BOB);
        session.reload().await;

        store.fail(FailPoint::Read(Table::MessageReactions));
        session.reload().await;
        let state = session.state();
        assert!(state.items.is_empty());
        assert!(state.error.is_some());
        assert_eq!(store.notifier.len(), 1);
    }
}
