//! Burst-coalescing reload trigger

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use convo_core::ChangeCallback;
use tracing::{trace, warn};

use crate::sessions::{ConversationListSession, ThreadSession, TypingSession};

type ReloadFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type ReloadAction = Arc<dyn Fn() -> ReloadFuture + Send + Sync>;

struct TriggerInner {
    window: Duration,
    scheduled: AtomicBool,
    action: ReloadAction,
    fired: AtomicU64,
    runs: AtomicU64,
}

/// Runs a reload at most once per window, however many changes arrive
///
/// The first `fire` schedules the reload after `window`; further fires before
/// it starts are absorbed. A fire that arrives while the reload is running
/// schedules one more.
#[derive(Clone)]
pub struct ReloadTrigger {
    inner: Arc<TriggerInner>,
}

impl ReloadTrigger {
    pub fn new<F, Fut>(window: Duration, reload: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let action: ReloadAction = Arc::new(move || -> ReloadFuture { Box::pin(reload()) });
        Self {
            inner: Arc::new(TriggerInner {
                window,
                scheduled: AtomicBool::new(false),
                action,
                fired: AtomicU64::new(0),
                runs: AtomicU64::new(0),
            }),
        }
    }

    pub fn for_conversation_list(session: ConversationListSession, window: Duration) -> Self {
        Self::new(window, move || {
            let session = session.clone();
            async move { session.load().await }
        })
    }

    pub fn for_thread(session: ThreadSession, window: Duration) -> Self {
        Self::new(window, move || {
            let session = session.clone();
            async move { session.reload().await }
        })
    }

    pub fn for_typing(session: TypingSession, window: Duration) -> Self {
        Self::new(window, move || {
            let session = session.clone();
            async move { session.refresh().await }
        })
    }

    /// Request a reload
    pub fn fire(&self) {
        self.inner.fired.fetch_add(1, Ordering::Relaxed);
        if self.inner.scheduled.swap(true, Ordering::SeqCst) {
            trace!("Reload already scheduled");
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            self.inner.scheduled.store(false, Ordering::SeqCst);
            warn!("Change arrived outside a runtime; reload skipped");
            return;
        };

        let inner = self.inner.clone();
        handle.spawn(async move {
            if !inner.window.is_zero() {
                tokio::time::sleep(inner.window).await;
            }
            inner.scheduled.store(false, Ordering::SeqCst);
            inner.runs.fetch_add(1, Ordering::Relaxed);
            (inner.action)().await;
        });
    }

    /// Change-feed callback that ignores the payload and fires
    pub fn callback(&self) -> ChangeCallback {
        let trigger = self.clone();
        Arc::new(move |_| trigger.fire())
    }

    pub fn fired(&self) -> u64 {
        self.inner.fired.load(Ordering::Relaxed)
    }

    /// Reloads started so far
    pub fn runs(&self) -> u64 {
        self.inner.runs.load(Ordering::Relaxed)
    }

    pub fn is_scheduled(&self) -> bool {
        self.inner.scheduled.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ReloadTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadTrigger")
            .field("window", &self.inner.window)
            .field("fired", &self.fired())
            .field("runs", &self.runs())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting(window: Duration) -> (ReloadTrigger, Arc<AtomicU64>) {
        let count = Arc::new(AtomicU64::new(0));
        let seen = count.clone();
        let trigger = ReloadTrigger::new(window, move || {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        });
        (trigger, count)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_runs_once() {
        let (trigger, count) = counting(Duration::from_millis(50));
        for _ in 0..10 {
            trigger.fire();
        }
        assert!(trigger.is_scheduled());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(trigger.fired(), 10);
        assert_eq!(trigger.runs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fire_after_window_runs_again() {
        let (trigger, count) = counting(Duration::from_millis(50));
        trigger.fire();
        tokio::time::sleep(Duration::from_millis(60)).await;
        trigger.fire();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_fire_without_runtime_is_skipped() {
        let (trigger, count) = counting(Duration::ZERO);
        trigger.fire();
        assert!(!trigger.is_scheduled());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
