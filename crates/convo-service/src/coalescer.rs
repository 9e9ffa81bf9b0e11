//! Debounced coalescer
//!
//! Collapses bursts of the same operation into one execution. Each call to
//! [`Coalescer::schedule`] takes a key and a not-yet-started future. A later
//! call with the same key inside the window resolves every earlier caller with
//! [`CoalesceError::Superseded`]; only the newest call waits out the window and
//! runs its future. Keys never interfere with each other.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

/// Outcome of a coalesced call that did not produce a value
#[derive(Debug, PartialEq, Eq)]
pub enum CoalesceError<E> {
    /// A newer call with the same key replaced this one
    Superseded,
    /// The surviving call ran and its operation failed
    Failed(E),
}

impl<E> CoalesceError<E> {
    #[inline]
    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded)
    }
}

impl<E: fmt::Display> fmt::Display for CoalesceError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Superseded => write!(f, "superseded"),
            Self::Failed(e) => write!(f, "{e}"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for CoalesceError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Superseded => None,
            Self::Failed(e) => Some(e),
        }
    }
}

struct Slot {
    ticket: u64,
    // Dropping or firing the sender wakes the waiting caller as superseded.
    cancel: oneshot::Sender<()>,
}

/// Trailing-edge debouncer keyed by `K`
pub struct Coalescer<K> {
    window: Duration,
    slots: Mutex<HashMap<K, Slot>>,
    next_ticket: AtomicU64,
}

impl<K> Coalescer<K>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            slots: Mutex::new(HashMap::new()),
            next_ticket: AtomicU64::new(0),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Run `operation` after the window unless another call for `key` arrives first
    pub async fn schedule<T, E, F>(&self, key: K, operation: F) -> Result<T, CoalesceError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed) + 1;
        let (cancel, superseded) = oneshot::channel();

        if let Some(previous) = self.slots.lock().insert(key.clone(), Slot { ticket, cancel }) {
            let _ = previous.cancel.send(());
        }
        let guard = SlotGuard {
            coalescer: self,
            key: &key,
            ticket,
        };

        tokio::select! {
            () = tokio::time::sleep(self.window) => {}
            _ = superseded => {
                debug!(key = ?key, "Coalesced call superseded");
                return Err(CoalesceError::Superseded);
            }
        }

        if !guard.claim() {
            debug!(key = ?key, "Coalesced call superseded at window end");
            return Err(CoalesceError::Superseded);
        }

        operation.await.map_err(CoalesceError::Failed)
    }

    /// Whether a call for `key` is waiting out its window
    pub fn pending(&self, key: &K) -> bool {
        self.slots.lock().contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// Resolve every waiting call as superseded
    pub fn cancel_all(&self) {
        self.slots.lock().clear();
    }

    fn release(&self, key: &K, ticket: u64) -> bool {
        let mut slots = self.slots.lock();
        if slots.get(key).is_some_and(|slot| slot.ticket == ticket) {
            slots.remove(key);
            true
        } else {
            false
        }
    }
}

/// Removes the caller's slot when its future is dropped early
struct SlotGuard<'a, K>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    coalescer: &'a Coalescer<K>,
    key: &'a K,
    ticket: u64,
}

impl<K> SlotGuard<'_, K>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    /// Take the slot for execution; false if another call replaced it
    fn claim(&self) -> bool {
        self.coalescer.release(self.key, self.ticket)
    }
}

impl<K> Drop for SlotGuard<'_, K>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    fn drop(&mut self) {
        self.coalescer.release(self.key, self.ticket);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn coalescer() -> Arc<Coalescer<&'static str>> {
        Arc::new(Coalescer::new(Duration::from_millis(300)))
    }

    async fn counted(runs: Arc<AtomicUsize>, value: u32) -> Result<u32, String> {
        runs.fetch_add(1, Ordering::SeqCst);
        Ok(value)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_runs_only_the_last_call() {
        let c = coalescer();
        let runs = Arc::new(AtomicUsize::new(0));

        let first = tokio::spawn({
            let (c, runs) = (c.clone(), runs.clone());
            async move { c.schedule("a", counted(runs, 1)).await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        let second = tokio::spawn({
            let (c, runs) = (c.clone(), runs.clone());
            async move { c.schedule("a", counted(runs, 2)).await }
        });

        assert_eq!(first.await.unwrap(), Err(CoalesceError::Superseded));
        assert_eq!(second.await.unwrap(), Ok(2));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!c.pending(&"a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_restarts_from_latest_call() {
        let c = coalescer();
        let runs = Arc::new(AtomicUsize::new(0));
        let start = tokio::time::Instant::now();

        let _first = tokio::spawn({
            let (c, runs) = (c.clone(), runs.clone());
            async move { c.schedule("a", counted(runs, 1)).await }
        });
        tokio::time::sleep(Duration::from_millis(200)).await;
        let result = c.schedule("a", counted(runs.clone(), 2)).await;

        assert_eq!(result, Ok(2));
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let c = coalescer();
        let runs = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            c.schedule("a", counted(runs.clone(), 1)),
            c.schedule("b", counted(runs.clone(), 2)),
        );
        assert_eq!(a, Ok(1));
        assert_eq!(b, Ok(2));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_survivor_receives_failure() {
        let c = coalescer();
        let result: Result<(), _> = c.schedule("a", async { Err("store down") }).await;
        assert_eq!(result, Err(CoalesceError::Failed("store down")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_supersedes_waiters() {
        let c = coalescer();
        let runs = Arc::new(AtomicUsize::new(0));
        let waiting = tokio::spawn({
            let (c, runs) = (c.clone(), runs.clone());
            async move { c.schedule("a", counted(runs, 1)).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(c.pending_count(), 1);

        c.cancel_all();
        assert!(waiting.await.unwrap().unwrap_err().is_superseded());
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_caller_releases_slot() {
        let c = coalescer();
        let runs = Arc::new(AtomicUsize::new(0));
        let handle = tokio::spawn({
            let (c, runs) = (c.clone(), runs.clone());
            async move { c.schedule("a", counted(runs, 1)).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.abort();
        let _ = handle.await;

        assert!(!c.pending(&"a"));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
