//! Inbox synchronizer
//!
//! Watches every message insert on behalf of one signed-in user. An insert in
//! the conversation they have open from someone else marks it read; an insert
//! elsewhere from someone else plays the received cue. Either way the
//! conversation list is refreshed, debounced.

use std::sync::Arc;

use convo_core::{ChangeCallback, ChangeEvent, Snowflake};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::notify::Notification;
use crate::services::{ReadStateService, ServiceContext, ServiceResult};
use crate::sessions::ConversationListSession;

use super::bridge::{BindingTarget, BridgeBinding, RealtimeBridge};
use super::trigger::ReloadTrigger;

/// The parts of a message insert the inbox reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Arrival {
    message_id: Option<Snowflake>,
    conversation_id: Snowflake,
    sender_id: Snowflake,
}

impl Arrival {
    fn from_event(event: &ChangeEvent) -> Option<Self> {
        let id = |column: &str| event.field(column).and_then(|v| Snowflake::parse(&v).ok());
        Some(Self {
            message_id: id("id"),
            conversation_id: id("conversation_id")?,
            sender_id: id("sender_id")?,
        })
    }
}

struct InboxShared {
    ctx: ServiceContext,
    user_id: Snowflake,
    open_conversation: Mutex<Option<Snowflake>>,
    refresh: ReloadTrigger,
}

impl InboxShared {
    fn on_insert(self: &Arc<Self>, event: &ChangeEvent) {
        let Some(arrival) = Arrival::from_event(event) else {
            debug!("Message insert without ids; refreshing");
            self.refresh.fire();
            return;
        };

        if arrival.sender_id == self.user_id {
            self.refresh.fire();
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("Change arrived outside a runtime; inbox update skipped");
            return;
        };
        let shared = self.clone();
        let is_open = *self.open_conversation.lock() == Some(arrival.conversation_id);
        if is_open {
            handle.spawn(async move { shared.read_open(arrival).await });
        } else {
            handle.spawn(async move { shared.announce(arrival).await });
        }
    }

    async fn read_open(&self, arrival: Arrival) {
        let result = ReadStateService::new(&self.ctx)
            .mark_read_debounced(arrival.conversation_id, self.user_id)
            .await;
        match result {
            // A later mark will refresh
            Err(e) if e.is_superseded() => return,
            Err(e) => warn!(error = %e, conversation_id = %arrival.conversation_id, "Mark read failed"),
            Ok(_) => {}
        }
        self.refresh.fire();
    }

    async fn announce(&self, arrival: Arrival) {
        let membership = match self
            .ctx
            .membership_repo()
            .find(arrival.conversation_id, self.user_id)
            .await
        {
            Ok(Some(membership)) => membership,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, conversation_id = %arrival.conversation_id, "Membership lookup failed");
                self.refresh.fire();
                return;
            }
        };

        if !membership.is_muted {
            self.ctx.notifier().notify(Notification::MessageReceived {
                conversation_id: arrival.conversation_id,
                message_id: arrival.message_id,
            });
        }
        self.refresh.fire();
    }
}

/// Keeps a user's conversation list and read state in step with new messages
pub struct InboxSynchronizer {
    shared: Arc<InboxShared>,
    binding: BridgeBinding,
}

impl InboxSynchronizer {
    /// Subscribe to message inserts and refresh `list` as they arrive
    pub fn start(ctx: &ServiceContext, list: ConversationListSession) -> ServiceResult<Self> {
        let user_id = list.user_id();
        let refresh = ReloadTrigger::for_conversation_list(list, ctx.config().sync.refresh_debounce);
        let shared = Arc::new(InboxShared {
            ctx: ctx.clone(),
            user_id,
            open_conversation: Mutex::new(None),
            refresh,
        });

        let weak = Arc::downgrade(&shared);
        let callback: ChangeCallback = Arc::new(move |event| {
            if let Some(shared) = weak.upgrade() {
                shared.on_insert(event);
            }
        });
        let binding = RealtimeBridge::from_context(ctx).bind(BindingTarget::Inbox(user_id), callback)?;

        Ok(Self { shared, binding })
    }

    /// Which conversation the user is looking at, if any
    pub fn set_open_conversation(&self, conversation_id: Option<Snowflake>) {
        *self.shared.open_conversation.lock() = conversation_id;
    }

    pub fn open_conversation(&self) -> Option<Snowflake> {
        *self.shared.open_conversation.lock()
    }

    pub fn refresh_trigger(&self) -> &ReloadTrigger {
        &self.shared.refresh
    }

    pub fn is_active(&self) -> bool {
        self.binding.is_active()
    }

    pub fn dispose(&mut self) {
        self.binding.dispose();
    }
}

impl std::fmt::Debug for InboxSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboxSynchronizer")
            .field("user_id", &self.shared.user_id)
            .field("open_conversation", &self.open_conversation())
            .field("binding", &self.binding)
            .finish()
    }
}
