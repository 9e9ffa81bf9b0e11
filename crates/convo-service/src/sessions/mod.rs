//! Caller-owned load sessions
//!
//! A session wraps one loader for one screen: it owns the last result, never
//! returns an error (failures become an empty list plus a dismissible message
//! and a notification), and drops results of loads that a newer load
//! overtook.

mod conversation_list;
mod thread;
mod typing;

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use crate::notify::{LoadScope, Notification, Notifier};
use crate::services::ServiceResult;

pub use conversation_list::ConversationListSession;
pub use thread::ThreadSession;
pub use typing::TypingSession;

/// What a screen renders
#[derive(Debug, Clone, PartialEq)]
pub struct LoadState<T> {
    pub items: Vec<T>,
    /// Dismissible message of the last failed load
    pub error: Option<String>,
    pub loading: bool,
    /// At least one load has completed, successfully or not
    pub loaded_once: bool,
}

impl<T> Default for LoadState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            error: None,
            loading: false,
            loaded_once: false,
        }
    }
}

/// Latest-wins holder shared by the sessions
struct LoadSlot<T> {
    state: RwLock<LoadState<T>>,
    generation: AtomicU64,
}

impl<T: Clone> LoadSlot<T> {
    fn new() -> Self {
        Self {
            state: RwLock::new(LoadState::default()),
            generation: AtomicU64::new(0),
        }
    }

    /// Start a load and return its generation
    fn begin(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.write().loading = true;
        generation
    }

    /// Apply a finished load unless a newer one has started; returns whether applied
    fn finish(
        &self,
        generation: u64,
        result: ServiceResult<Vec<T>>,
        scope: LoadScope,
        notifier: &dyn Notifier,
    ) -> bool {
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(scope = ?scope, generation, "Discarding stale load result");
            return false;
        }

        let failure = {
            let mut state = self.state.write();
            state.loading = false;
            state.loaded_once = true;
            match result {
                Ok(items) => {
                    state.items = items;
                    state.error = None;
                    None
                }
                Err(e) => {
                    let message = e.user_message();
                    state.items.clear();
                    state.error = Some(message.clone());
                    Some(message)
                }
            }
        };

        if let Some(message) = failure {
            notifier.notify(Notification::LoadFailed { scope, message });
        }
        true
    }

    fn snapshot(&self) -> LoadState<T> {
        self.state.read().clone()
    }

    fn with_items<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.state.read().items)
    }

    fn with_state_mut<R>(&self, f: impl FnOnce(&mut LoadState<T>) -> R) -> R {
        f(&mut self.state.write())
    }

    fn dismiss_error(&self) {
        self.state.write().error = None;
    }
}
