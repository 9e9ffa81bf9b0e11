//! Realtime fan-out bridge
//!
//! Binds loaders to change-feed subscriptions. Callbacks are triggers only:
//! they schedule a reload and never look at the changed row, except for the
//! live-append path of an open thread.

use std::sync::Arc;

use convo_core::traits::ChangeFeed;
use convo_core::{ChangeCallback, ChangeEvent, ChangeKind, EventMask, Snowflake, Subscription, SubscriptionHandle, Table};
use tracing::{debug, info, warn};

use crate::services::{ServiceContext, ServiceResult};
use crate::sessions::ThreadSession;

use super::trigger::ReloadTrigger;

/// What a binding keeps fresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingTarget {
    /// Conversation list of a user
    ConversationList(Snowflake),
    /// Messages, reactions, attachments and receipts of a conversation
    Thread(Snowflake),
    /// Typing rows of a conversation
    Typing(Snowflake),
    /// Every message insert, for a user's inbox
    Inbox(Snowflake),
}

impl BindingTarget {
    pub fn id(self) -> Snowflake {
        match self {
            Self::ConversationList(id) | Self::Thread(id) | Self::Typing(id) | Self::Inbox(id) => id,
        }
    }

    /// Same kind of target for another id
    pub fn with_id(self, id: Snowflake) -> Self {
        match self {
            Self::ConversationList(_) => Self::ConversationList(id),
            Self::Thread(_) => Self::Thread(id),
            Self::Typing(_) => Self::Typing(id),
            Self::Inbox(_) => Self::Inbox(id),
        }
    }

    pub fn subscriptions(self) -> Vec<Subscription> {
        match self {
            Self::ConversationList(user_id) => vec![
                Subscription::table(Table::Conversations),
                Subscription::table(Table::ConversationMembers).filter_eq("user_id", user_id),
                Subscription::table(Table::Messages).events(EventMask::INSERT),
            ],
            // Reaction, attachment and receipt rows carry no conversation id
            Self::Thread(conversation_id) => vec![
                Subscription::table(Table::Messages).filter_eq("conversation_id", conversation_id),
                Subscription::table(Table::MessageReactions),
                Subscription::table(Table::MessageAttachments),
                Subscription::table(Table::MessageReadReceipts),
            ],
            Self::Typing(conversation_id) => vec![
                Subscription::table(Table::TypingIndicators).filter_eq("conversation_id", conversation_id),
            ],
            Self::Inbox(_) => vec![Subscription::table(Table::Messages).events(EventMask::INSERT)],
        }
    }
}

/// Creates bindings against one change feed
#[derive(Clone)]
pub struct RealtimeBridge {
    feed: Arc<dyn ChangeFeed>,
}

impl RealtimeBridge {
    pub fn new(feed: Arc<dyn ChangeFeed>) -> Self {
        Self { feed }
    }

    pub fn from_context(ctx: &ServiceContext) -> Self {
        Self::new(ctx.change_feed_arc())
    }

    /// Subscribe `callback` to every table `target` depends on
    pub fn bind(&self, target: BindingTarget, callback: ChangeCallback) -> ServiceResult<BridgeBinding> {
        let handles = subscribe_all(self.feed.as_ref(), target, &callback)?;
        info!(target = ?target, subscriptions = handles.len(), "Realtime binding created");
        Ok(BridgeBinding {
            feed: self.feed.clone(),
            target,
            callback,
            handles,
        })
    }

    pub fn bind_conversation_list(&self, user_id: Snowflake, trigger: &ReloadTrigger) -> ServiceResult<BridgeBinding> {
        self.bind(BindingTarget::ConversationList(user_id), trigger.callback())
    }

    pub fn bind_thread(&self, conversation_id: Snowflake, trigger: &ReloadTrigger) -> ServiceResult<BridgeBinding> {
        self.bind(BindingTarget::Thread(conversation_id), trigger.callback())
    }

    pub fn bind_typing(&self, conversation_id: Snowflake, trigger: &ReloadTrigger) -> ServiceResult<BridgeBinding> {
        self.bind(BindingTarget::Typing(conversation_id), trigger.callback())
    }

    /// Thread binding with the live-append fast path
    ///
    /// Message inserts append the new row to `session`; every other change
    /// goes through a coalesced full reload.
    pub fn bind_thread_live(&self, session: ThreadSession, window: std::time::Duration) -> ServiceResult<BridgeBinding> {
        let conversation_id = session.conversation_id();
        let trigger = ReloadTrigger::for_thread(session.clone(), window);
        let callback: ChangeCallback = Arc::new(move |event: &ChangeEvent| {
            let inserted = (event.table == Table::Messages && event.kind == ChangeKind::Insert)
                .then(|| event.field("id"))
                .flatten()
                .and_then(|id| Snowflake::parse(&id).ok());
            let Some(message_id) = inserted else {
                trigger.fire();
                return;
            };
            let Ok(handle) = tokio::runtime::Handle::try_current() else {
                warn!(message_id = %message_id, "Change arrived outside a runtime; append skipped");
                return;
            };
            let session = session.clone();
            handle.spawn(async move {
                session.append_live(message_id).await;
            });
        });
        self.bind(BindingTarget::Thread(conversation_id), callback)
    }
}

impl std::fmt::Debug for RealtimeBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeBridge").finish_non_exhaustive()
    }
}

/// Subscribe every table of `target`, undoing partial work on failure
fn subscribe_all(
    feed: &dyn ChangeFeed,
    target: BindingTarget,
    callback: &ChangeCallback,
) -> ServiceResult<Vec<SubscriptionHandle>> {
    let mut handles = Vec::new();
    for subscription in target.subscriptions() {
        match feed.subscribe(subscription, callback.clone()) {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                for handle in handles {
                    feed.unsubscribe(handle);
                }
                warn!(error = %e, target = ?target, "Realtime binding failed");
                return Err(e.into());
            }
        }
    }
    Ok(handles)
}

/// Live subscriptions of one binding; released on `dispose` or drop
pub struct BridgeBinding {
    feed: Arc<dyn ChangeFeed>,
    target: BindingTarget,
    callback: ChangeCallback,
    handles: Vec<SubscriptionHandle>,
}

impl BridgeBinding {
    pub fn target(&self) -> BindingTarget {
        self.target
    }

    pub fn is_active(&self) -> bool {
        !self.handles.is_empty()
    }

    /// Unsubscribe everything; returns how many subscriptions were released
    pub fn dispose(&mut self) -> usize {
        let released = self
            .handles
            .drain(..)
            .filter(|handle| self.feed.unsubscribe(*handle))
            .count();
        if released > 0 {
            debug!(target = ?self.target, released, "Realtime binding disposed");
        }
        released
    }

    /// Follow a new id
    ///
    /// The new subscriptions are made before the old ones are released, so a
    /// failure leaves the binding as it was.
    pub fn rebind(&mut self, id: Snowflake, callback: ChangeCallback) -> ServiceResult<()> {
        let target = self.target.with_id(id);
        let handles = subscribe_all(self.feed.as_ref(), target, &callback)?;
        self.dispose();
        self.target = target;
        self.callback = callback;
        self.handles = handles;
        info!(target = ?target, "Realtime binding moved");
        Ok(())
    }

    /// Re-subscribe after `dispose`, with the same target and callback
    pub fn resume(&mut self) -> ServiceResult<()> {
        if self.is_active() {
            return Ok(());
        }
        self.handles = subscribe_all(self.feed.as_ref(), self.target, &self.callback)?;
        Ok(())
    }
}

impl Drop for BridgeBinding {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for BridgeBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeBinding")
            .field("target", &self.target)
            .field("subscriptions", &self.handles.len())
            .finish_non_exhaustive()
    }
}
