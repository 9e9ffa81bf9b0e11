//! User-facing notifications (toasts and sound cues)

use convo_core::Snowflake;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

/// Which loader failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum LoadScope {
    Conversations,
    Thread(Snowflake),
    Typing(Snowflake),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A loader failed; the list or thread was left empty
    LoadFailed { scope: LoadScope, message: String },
    /// A send failed; the draft should be restored
    SendFailed {
        conversation_id: Snowflake,
        message: String,
    },
    /// Someone else's message arrived outside the open conversation
    MessageReceived {
        conversation_id: Snowflake,
        message_id: Option<Snowflake>,
    },
}

/// Sink for notifications shown to the user
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match &notification {
            Notification::LoadFailed { scope, message } => {
                warn!(scope = ?scope, message = %message, "Load failed");
            }
            Notification::SendFailed {
                conversation_id,
                message,
            } => {
                warn!(conversation_id = %conversation_id, message = %message, "Send failed");
            }
            Notification::MessageReceived {
                conversation_id, ..
            } => {
                info!(conversation_id = %conversation_id, "Message received");
            }
        }
    }
}

/// Keeps every notification in memory
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.seen.lock().clone()
    }

    /// Drain what has been collected so far
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.seen.lock())
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }

    pub fn received_cues(&self) -> usize {
        self.seen
            .lock()
            .iter()
            .filter(|n| matches!(n, Notification::MessageReceived { .. }))
            .count()
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.lock().push(notification);
    }
}
