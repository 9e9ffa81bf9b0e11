use std::sync::Arc;

use convo_core::Snowflake;
use tracing::instrument;

use crate::dto::ConversationView;
use crate::notify::LoadScope;
use crate::services::{ConversationService, ServiceContext};

use super::{LoadSlot, LoadState};

/// The conversation list of one user
///
/// Clones share state, so a realtime binding can hold one while the screen
/// holds another.
#[derive(Clone)]
pub struct ConversationListSession {
    ctx: ServiceContext,
    user_id: Snowflake,
    slot: Arc<LoadSlot<ConversationView>>,
}

impl ConversationListSession {
    pub fn new(ctx: ServiceContext, user_id: Snowflake) -> Self {
        Self {
            ctx,
            user_id,
            slot: Arc::new(LoadSlot::new()),
        }
    }

    pub fn user_id(&self) -> Snowflake {
        self.user_id
    }

    /// Re-run the whole aggregation; failures land in the state, not the caller
    #[instrument(skip(self), fields(user_id = %self.user_id))]
    pub async fn load(&self) {
        let generation = self.slot.begin();
        let result = ConversationService::new(&self.ctx)
            .load_conversations(self.user_id)
            .await;
        self.slot
            .finish(generation, result, LoadScope::Conversations, self.ctx.notifier());
    }

    /// Manual retry after a failed load
    pub async fn retry(&self) {
        self.slot.dismiss_error();
        self.load().await;
    }

    pub fn state(&self) -> LoadState<ConversationView> {
        self.slot.snapshot()
    }

    pub fn conversations(&self) -> Vec<ConversationView> {
        self.slot.snapshot().items
    }

    /// Sum of unread counts, for a badge
    pub fn unread_total(&self) -> usize {
        self.slot
            .with_items(|items| items.iter().map(|c| c.unread_count).sum())
    }

    pub fn dismiss_error(&self) {
        self.slot.dismiss_error();
    }
}

impl std::fmt::Debug for ConversationListSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationListSession")
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}
