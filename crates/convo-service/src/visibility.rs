//! Visibility tracker
//!
//! Turns intersection signals for a conversation's last message into a single
//! "became read" callback. A session arms a dwell timer when the visible ratio
//! reaches the threshold, cancels it when the ratio drops, and fires at most
//! once per attached conversation.

use std::sync::Arc;
use std::time::Duration;

use convo_common::config::SyncConfig;
use convo_core::Snowflake;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

/// Invoked once the last message has stayed visible for the dwell time
pub type ReadCallback = Arc<dyn Fn(Snowflake) + Send + Sync>;

/// Factory for visibility sessions sharing one threshold and dwell time
#[derive(Debug, Clone, Copy)]
pub struct VisibilityTracker {
    threshold: f64,
    dwell: Duration,
}

impl VisibilityTracker {
    pub fn new(threshold: f64, dwell: Duration) -> Self {
        Self { threshold, dwell }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.visibility_threshold, config.visibility_dwell)
    }

    pub fn session(&self) -> VisibilitySession {
        VisibilitySession {
            threshold: self.threshold,
            dwell: self.dwell,
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }
}

#[derive(Default)]
struct SessionState {
    conversation_id: Option<Snowflake>,
    callback: Option<ReadCallback>,
    intersecting: bool,
    fired: bool,
    timer: Option<JoinHandle<()>>,
    // Bumped on every reset so a timer from an older session never fires.
    epoch: u64,
    // Bumped on every arm; only the timer holding the current value may fire.
    armed: u64,
}

impl SessionState {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    /// Called by an elapsed timer. An aborted timer can still get here if it
    /// woke before the abort, so it must match both counters to touch state.
    fn take_due(&mut self, epoch: u64, armed: u64) -> Option<ReadCallback> {
        if self.epoch != epoch || self.armed != armed || self.timer.is_none() {
            return None;
        }
        self.timer = None;
        if self.fired || !self.intersecting {
            return None;
        }
        self.fired = true;
        self.callback.clone()
    }
}

/// Per-view read tracking, owned by whoever renders the conversation
pub struct VisibilitySession {
    threshold: f64,
    dwell: Duration,
    state: Arc<Mutex<SessionState>>,
}

impl VisibilitySession {
    /// Point the session at a conversation
    ///
    /// Attaching a different conversation starts a new session; attaching the
    /// same one only swaps the callback and keeps the fired guard.
    pub fn attach(&self, conversation_id: Snowflake, on_became_read: ReadCallback) {
        let mut state = self.state.lock();
        if state.conversation_id != Some(conversation_id) {
            state.cancel_timer();
            state.epoch += 1;
            state.conversation_id = Some(conversation_id);
            state.intersecting = false;
            state.fired = false;
        }
        state.callback = Some(on_became_read);
    }

    /// Feed the visible ratio of the last message element
    pub fn observe(&self, ratio: f64) {
        let mut state = self.state.lock();
        let Some(conversation_id) = state.conversation_id else {
            return;
        };

        if ratio < self.threshold {
            state.intersecting = false;
            state.cancel_timer();
            return;
        }

        state.intersecting = true;
        if state.fired || state.timer.is_some() {
            return;
        }

        debug!(conversation_id = %conversation_id, "Dwell timer armed");
        state.armed += 1;
        let (epoch, armed) = (state.epoch, state.armed);
        let shared = self.state.clone();
        let dwell = self.dwell;
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(dwell).await;
            let callback = shared.lock().take_due(epoch, armed);
            if let Some(callback) = callback {
                debug!(conversation_id = %conversation_id, "Conversation became read");
                callback(conversation_id);
            }
        }));
    }

    /// Stop tracking; a later `attach` starts fresh
    pub fn detach(&self) {
        let mut state = self.state.lock();
        state.cancel_timer();
        state.epoch += 1;
        state.conversation_id = None;
        state.callback = None;
        state.intersecting = false;
        state.fired = false;
    }

    pub fn conversation_id(&self) -> Option<Snowflake> {
        self.state.lock().conversation_id
    }

    /// Whether the read callback already ran for the attached conversation
    pub fn has_fired(&self) -> bool {
        self.state.lock().fired
    }

    pub fn is_armed(&self) -> bool {
        self.state.lock().timer.is_some()
    }
}

impl Drop for VisibilitySession {
    fn drop(&mut self) {
        self.state.lock().cancel_timer();
    }
}
