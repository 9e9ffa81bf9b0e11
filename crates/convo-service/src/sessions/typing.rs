use std::sync::Arc;

use convo_core::Snowflake;
use tracing::warn;

use crate::dto::TypingView;
use crate::notify::LoadScope;
use crate::services::{ServiceContext, TypingService};

use super::{LoadSlot, LoadState};

/// Who else is typing in one conversation, plus the viewer's own keystrokes
#[derive(Clone)]
pub struct TypingSession {
    ctx: ServiceContext,
    conversation_id: Snowflake,
    viewer_id: Snowflake,
    slot: Arc<LoadSlot<TypingView>>,
}

impl TypingSession {
    pub fn new(ctx: ServiceContext, conversation_id: Snowflake, viewer_id: Snowflake) -> Self {
        Self {
            ctx,
            conversation_id,
            viewer_id,
            slot: Arc::new(LoadSlot::new()),
        }
    }

    pub async fn refresh(&self) {
        let generation = self.slot.begin();
        let result = TypingService::new(&self.ctx)
            .list_typing(self.conversation_id, self.viewer_id)
            .await;
        self.slot.finish(
            generation,
            result,
            LoadScope::Typing(self.conversation_id),
            self.ctx.notifier(),
        );
    }

    /// The viewer typed; failures are only logged
    pub async fn keystroke(&self) {
        if let Err(e) = TypingService::new(&self.ctx)
            .start_typing(self.conversation_id, self.viewer_id)
            .await
        {
            warn!(error = %e, conversation_id = %self.conversation_id, "Failed to publish typing");
        }
    }

    pub async fn stop(&self) {
        if let Err(e) = TypingService::new(&self.ctx)
            .stop_typing(self.conversation_id, self.viewer_id)
            .await
        {
            warn!(error = %e, conversation_id = %self.conversation_id, "Failed to clear typing");
        }
    }

    pub fn typists(&self) -> Vec<TypingView> {
        self.slot.snapshot().items
    }

    pub fn state(&self) -> LoadState<TypingView> {
        self.slot.snapshot()
    }

    /// Indicator text, `None` when nobody is typing
    pub fn label(&self) -> Option<String> {
        self.slot.with_items(|typists| match typists {
            [] => None,
            [one] => Some(format!("{} is typing…", one.profile.label())),
            [first, second] => Some(format!(
                "{} and {} are typing…",
                first.profile.label(),
                second.profile.label()
            )),
            many => Some(format!("{} people are typing…", many.len())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{engine, ALICE, BOB, CAROL};
    use convo_core::SnowflakeGenerator;

    #[tokio::test(start_paused = true)]
    async fn test_label_phrasing() {
        let (ctx, store) = engine().await;
        let extra = SnowflakeGenerator::new(3).generate();
        store.insert_profile(convo_core::Profile::new(extra, "dave"));
        let conv = store.seed_group(ALICE, &[BOB, CAROL, extra]).await;

        let viewer = TypingSession::new(ctx.clone(), conv, ALICE);
        viewer.refresh().await;
        assert_eq!(viewer.label(), None);

        TypingSession::new(ctx.clone(), conv, BOB).keystroke().await;
        viewer.refresh().await;
        assert_eq!(viewer.label().as_deref(), Some("Bob is typing…"));

        TypingSession::new(ctx.clone(), conv, CAROL).keystroke().await;
        viewer.refresh().await;
        assert_eq!(viewer.label().as_deref(), Some("Bob and Carol are typing…"));

        TypingSession::new(ctx.clone(), conv, extra).keystroke().await;
        viewer.refresh().await;
        assert_eq!(viewer.label().as_deref(), Some("3 people are typing…"));

        // The viewer never sees themselves
        viewer.keystroke().await;
        viewer.refresh().await;
        assert_eq!(viewer.typists().len(), 3);
        viewer.stop().await;
    }
}
