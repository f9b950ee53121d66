//! Client-scoped timer registry.
//!
//! # Responsibilities
//! - Schedule one-shot and periodic callbacks on the client's scheduler
//! - Track every outstanding timer so it can be cancelled in bulk
//! - Remove one-shot timers from the registry once they have fired
//!
//! # Design Decisions
//! - Registry membership is the only record of ownership: a handle that is
//!   not registered is not live
//! - Callbacks hold a weak reference to their owner; a dropped owner ends the timer
//! - Entries are inserted before the task is spawned, so a zero-delay timer
//!   can never leave a stale entry behind

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use futures_util::future::{AbortHandle, Abortable};
use tokio::runtime::Handle;
use tokio::time::{self, Instant};

use crate::observability::metrics;

/// Global counter for timer IDs.
static TIMER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Shortest period a periodic timer may use.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Unique identifier for a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

impl TimerId {
    fn next() -> Self {
        Self(TIMER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Whether a timer fires once or repeatedly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Once,
    Periodic,
}

/// Opaque reference to a scheduled callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle {
    id: TimerId,
    kind: TimerKind,
}

impl TimerHandle {
    /// Registry-wide identifier of this timer.
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Whether this is a one-shot or periodic timer.
    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    /// Check if the timer repeats.
    pub fn is_periodic(&self) -> bool {
        self.kind == TimerKind::Periodic
    }
}

#[derive(Debug)]
struct TimerEntry {
    kind: TimerKind,
    abort: AbortHandle,
}

/// Registry of outstanding timers owned by one client.
#[derive(Debug, Clone)]
pub struct TimerRegistry {
    scheduler: Handle,
    timers: Arc<DashMap<TimerId, TimerEntry>>,
}

impl TimerRegistry {
    /// Create an empty registry that spawns on the given scheduler.
    pub fn new(scheduler: Handle) -> Self {
        Self {
            scheduler,
            timers: Arc::new(DashMap::new()),
        }
    }

    /// Run `callback` once after `delay`.
    ///
    /// The timer removes itself from the registry right after the callback
    /// returns.
    pub fn schedule_once<T, F>(&self, owner: Weak<T>, delay: Duration, callback: F) -> TimerHandle
    where
        T: Send + Sync + 'static,
        F: FnOnce(Arc<T>) + Send + 'static,
    {
        let handle = self.register(TimerKind::Once);
        let timers = Arc::clone(&self.timers);
        let id = handle.id;

        self.spawn(handle, async move {
            time::sleep(delay).await;
            if let Some(owner) = owner.upgrade() {
                callback(owner);
            }
            unregister(&timers, id);
        });

        handle
    }

    /// Run `callback` every `interval`, starting one interval from now.
    pub fn schedule_periodic<T, F>(
        &self,
        owner: Weak<T>,
        interval: Duration,
        mut callback: F,
    ) -> TimerHandle
    where
        T: Send + Sync + 'static,
        F: FnMut(Arc<T>) + Send + 'static,
    {
        let handle = self.register(TimerKind::Periodic);
        let timers = Arc::clone(&self.timers);
        let id = handle.id;
        let period = interval.max(MIN_PERIOD);

        self.spawn(handle, async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                match owner.upgrade() {
                    Some(owner) => callback(owner),
                    None => break,
                }
            }
            unregister(&timers, id);
        });

        handle
    }

    /// Stop a timer and forget it.
    ///
    /// Returns `false` when the timer was no longer registered; cancelling
    /// twice is harmless.
    pub fn cancel(&self, handle: &TimerHandle) -> bool {
        match self.timers.remove(&handle.id) {
            Some((_, entry)) => {
                entry.abort.abort();
                metrics::record_active_timers(self.timers.len());
                tracing::trace!(timer_id = %handle.id, kind = ?entry.kind, "Timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancel every registered timer. Returns how many were stopped.
    pub fn cancel_all(&self) -> usize {
        let ids: Vec<TimerId> = self.timers.iter().map(|entry| *entry.key()).collect();

        let mut cancelled = 0;
        for id in ids {
            if let Some((_, entry)) = self.timers.remove(&id) {
                entry.abort.abort();
                cancelled += 1;
            }
        }

        metrics::record_active_timers(self.timers.len());
        if cancelled > 0 {
            tracing::debug!(cancelled, "Cancelled client timers");
        }
        cancelled
    }

    /// Number of live timers.
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Check if no timers are live.
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// The scheduler timers are spawned on.
    pub fn scheduler(&self) -> &Handle {
        &self.scheduler
    }

    fn register(&self, kind: TimerKind) -> TimerHandle {
        TimerHandle {
            id: TimerId::next(),
            kind,
        }
    }

    fn spawn<Fut>(&self, handle: TimerHandle, task: Fut)
    where
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let (abort, registration) = AbortHandle::new_pair();
        self.timers.insert(
            handle.id,
            TimerEntry {
                kind: handle.kind,
                abort,
            },
        );
        metrics::record_active_timers(self.timers.len());

        self.scheduler.spawn(Abortable::new(task, registration));
    }
}

fn unregister(timers: &DashMap<TimerId, TimerEntry>, id: TimerId) {
    if timers.remove(&id).is_some() {
        metrics::record_active_timers(timers.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn registry() -> TimerRegistry {
        TimerRegistry::new(Handle::current())
    }

    #[tokio::test]
    async fn test_once_fires_and_unregisters() {
        let timers = registry();
        let owner = Arc::new(AtomicUsize::new(0));

        let handle = timers.schedule_once(Arc::downgrade(&owner), Duration::from_millis(10), |o| {
            o.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(timers.len(), 1);
        assert!(!handle.is_periodic());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(owner.load(Ordering::SeqCst), 1);
        assert!(timers.is_empty());
    }

    #[tokio::test]
    async fn test_periodic_repeats_until_cancelled() {
        let timers = registry();
        let owner = Arc::new(AtomicUsize::new(0));

        let handle = timers.schedule_periodic(Arc::downgrade(&owner), Duration::from_millis(10), |o| {
            o.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(owner.load(Ordering::SeqCst) >= 2);
        assert_eq!(timers.len(), 1);

        assert!(timers.cancel(&handle));
        let fired = owner.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(owner.load(Ordering::SeqCst), fired);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let timers = registry();
        let owner = Arc::new(AtomicUsize::new(0));

        let handle = timers.schedule_once(Arc::downgrade(&owner), Duration::from_secs(60), |_| {});
        assert!(timers.cancel(&handle));
        assert!(!timers.cancel(&handle));
        assert!(timers.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_all_stops_everything() {
        let timers = registry();
        let owner = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            timers.schedule_once(Arc::downgrade(&owner), Duration::from_millis(30), |o| {
                o.fetch_add(1, Ordering::SeqCst);
            });
        }
        timers.schedule_periodic(Arc::downgrade(&owner), Duration::from_millis(30), |o| {
            o.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(timers.len(), 4);

        assert_eq!(timers.cancel_all(), 4);
        assert!(timers.is_empty());
        assert_eq!(timers.cancel_all(), 0);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(owner.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dropped_owner_ends_periodic_timer() {
        let timers = registry();
        let owner = Arc::new(AtomicUsize::new(0));

        timers.schedule_periodic(Arc::downgrade(&owner), Duration::from_millis(10), |_| {});
        drop(owner);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(timers.is_empty());
    }
}
