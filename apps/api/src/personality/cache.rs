//! Report Cache: per-result memoization with single-flight fill.
//!
//! Finished reports live in a bounded LRU; evicted ones are reloaded from the
//! persisted copy by the caller's compute closure. Concurrent readers of a
//! missing key all await the same shared future, so the expensive pipeline
//! (and its enrichment call) runs once per key at a time.
//!
//! The computation itself runs on a spawned task: if every caller goes away
//! it still completes and fills the cache. Each flight carries an epoch; the
//! task only writes back while its flight is still the current one for the
//! key, so an `invalidate` issued mid-flight can never be undone by the old
//! result. An invalidated flight stays behind as a tombstone until it ends,
//! and the next computation for that key waits for it before starting.
//! Failures are handed to the waiting callers and not cached.

use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::errors::ReportError;
use crate::personality::composer::Report;

pub const DEFAULT_REPORT_CACHE_CAPACITY: usize = 1024;

type Flight = Shared<BoxFuture<'static, Result<Arc<Report>, ReportError>>>;

enum InFlight {
    /// Current computation; its result is stored.
    Pending { epoch: u64, flight: Flight },
    /// Invalidated while running; its result is returned to its own waiters only.
    Superseded { epoch: u64, flight: Flight },
}

impl InFlight {
    fn epoch(&self) -> u64 {
        match self {
            InFlight::Pending { epoch, .. } | InFlight::Superseded { epoch, .. } => *epoch,
        }
    }
}

struct Slots {
    ready: LruCache<Uuid, Arc<Report>>,
    in_flight: HashMap<Uuid, InFlight>,
}

type SharedSlots = Arc<Mutex<Slots>>;

pub struct ReportCache {
    slots: SharedSlots,
    next_epoch: AtomicU64,
}

// The lock is only ever held for map operations, never across an await.
fn lock(slots: &Mutex<Slots>) -> MutexGuard<'_, Slots> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Retires flight `epoch` for `id`. The report is kept only if that flight
/// was still the current one.
fn settle(slots: &Mutex<Slots>, id: Uuid, epoch: u64, report: Option<&Arc<Report>>) {
    let mut slots = lock(slots);
    let current = match slots.in_flight.get(&id) {
        Some(flight) if flight.epoch() == epoch => matches!(flight, InFlight::Pending { .. }),
        _ => return,
    };
    slots.in_flight.remove(&id);
    if let (true, Some(report)) = (current, report) {
        slots.ready.put(id, Arc::clone(report));
    }
}

impl ReportCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPORT_CACHE_CAPACITY)
    }

    /// Bounds the number of finished reports kept in memory. Zero is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            slots: Arc::new(Mutex::new(Slots {
                ready: LruCache::new(capacity),
                in_flight: HashMap::new(),
            })),
            next_epoch: AtomicU64::new(0),
        }
    }

    /// Returns the cached report, joins an in-flight computation, or starts one
    /// with `compute`. `compute` is only called on a miss.
    pub async fn get_or_compute<F, Fut>(&self, id: Uuid, compute: F) -> Result<Arc<Report>, ReportError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Report, ReportError>> + Send + 'static,
    {
        let flight = {
            let mut slots = lock(&self.slots);
            if let Some(report) = slots.ready.get(&id) {
                debug!("Report cache hit for {id}");
                return Ok(Arc::clone(report));
            }
            let (joined, predecessor) = match slots.in_flight.get(&id) {
                Some(InFlight::Pending { flight, .. }) => (Some(flight.clone()), None),
                Some(InFlight::Superseded { flight, .. }) => (None, Some(flight.clone())),
                None => (None, None),
            };
            match joined {
                Some(flight) => {
                    debug!("Joining in-flight report computation for {id}");
                    flight
                }
                None => {
                    if predecessor.is_some() {
                        info!("Report for {id} still computing for an invalidated read, queueing behind it");
                    } else {
                        info!("Report cache miss for {id}, computing");
                    }
                    let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
                    let flight = self.start(id, epoch, predecessor, compute());
                    slots.in_flight.insert(
                        id,
                        InFlight::Pending {
                            epoch,
                            flight: flight.clone(),
                        },
                    );
                    flight
                }
            }
        };
        flight.await
    }

    fn start<Fut>(&self, id: Uuid, epoch: u64, predecessor: Option<Flight>, work: Fut) -> Flight
    where
        Fut: Future<Output = Result<Report, ReportError>> + Send + 'static,
    {
        let task_slots = Arc::clone(&self.slots);
        let handle = tokio::spawn(async move {
            if let Some(previous) = predecessor {
                // outcome belongs to the invalidated read
                let _ = previous.await;
            }
            let result = work.await.map(Arc::new);
            settle(&task_slots, id, epoch, result.as_ref().ok());
            result
        });

        let join_slots = Arc::clone(&self.slots);
        async move {
            match handle.await {
                Ok(result) => result,
                Err(join_error) => {
                    error!("Report computation for {id} did not finish: {join_error}");
                    settle(&join_slots, id, epoch, None);
                    Err(ReportError::Aborted(join_error.to_string()))
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Drops the cached report for `id`. A computation already in flight
    /// still answers its current waiters but will not be stored, and the next
    /// computation for `id` starts only after it ends.
    pub fn invalidate(&self, id: Uuid) {
        let mut slots = lock(&self.slots);
        let dropped_ready = slots.ready.pop(&id).is_some();
        let superseded = match slots.in_flight.remove(&id) {
            Some(InFlight::Pending { epoch, flight }) => {
                slots.in_flight.insert(id, InFlight::Superseded { epoch, flight });
                true
            }
            Some(tombstone) => {
                slots.in_flight.insert(id, tombstone);
                false
            }
            None => false,
        };
        if dropped_ready || superseded {
            info!("Invalidated cached report for {id}");
        }
    }

    #[cfg(test)]
    fn cached(&self, id: Uuid) -> Option<Arc<Report>> {
        lock(&self.slots).ready.peek(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use crate::personality::catalog::Catalog;
    use crate::personality::composer::Composer;
    use crate::personality::demographics::Demographics;
    use crate::personality::enrichment::{EnrichmentFailure, EnrichmentOutcome};
    use crate::personality::traits::TraitVector;

    fn sample_report(id: Uuid) -> Report {
        Composer::new(Arc::new(Catalog::builtin())).compose(
            id,
            &TraitVector::NEUTRAL,
            &Demographics::default(),
            &EnrichmentOutcome::Unavailable(EnrichmentFailure::Timeout),
        )
    }

    /// A compute closure that counts its invocations and sleeps before finishing.
    fn slow_compute(
        id: Uuid,
        calls: &Arc<AtomicUsize>,
        delay: Duration,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<Report, ReportError>> {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::time::sleep(delay).await;
                Ok(sample_report(id))
            }
            .boxed()
        }
    }

    /// Tracks how many computations are running at once.
    #[derive(Default)]
    struct Overlap {
        running: AtomicUsize,
        max: AtomicUsize,
    }

    fn tracked_compute(
        id: Uuid,
        overlap: &Arc<Overlap>,
        delay: Duration,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<Report, ReportError>> {
        let overlap = Arc::clone(overlap);
        move || {
            async move {
                let now = overlap.running.fetch_add(1, Ordering::SeqCst) + 1;
                overlap.max.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                overlap.running.fetch_sub(1, Ordering::SeqCst);
                Ok(sample_report(id))
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_second_read_is_served_from_cache() {
        let cache = ReportCache::new();
        let id = Uuid::new_v4();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache.get_or_compute(id, slow_compute(id, &calls, Duration::ZERO)).await.unwrap();
        let second = cache.get_or_compute(id, slow_compute(id, &calls, Duration::ZERO)).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_readers_share_one_computation() {
        let cache = Arc::new(ReportCache::new());
        let id = Uuid::new_v4();
        let calls = Arc::new(AtomicUsize::new(0));

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let compute = slow_compute(id, &calls, Duration::from_secs(2));
                tokio::spawn(async move { cache.get_or_compute(id, compute).await })
            })
            .collect();

        let mut reports = Vec::new();
        for reader in readers {
            reports.push(reader.await.unwrap().unwrap());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(reports.iter().all(|r| Arc::ptr_eq(r, &reports[0])));
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cache = ReportCache::new();
        let id = Uuid::new_v4();

        let failed = cache
            .get_or_compute(id, || async move { Err(ReportError::DemographicsMissing(id)) })
            .await;
        assert_eq!(failed.unwrap_err(), ReportError::DemographicsMissing(id));
        assert!(cache.cached(id).is_none());

        let calls = Arc::new(AtomicUsize::new(0));
        cache.get_or_compute(id, slow_compute(id, &calls, Duration::ZERO)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_during_flight_is_not_overwritten() {
        let cache = Arc::new(ReportCache::new());
        let id = Uuid::new_v4();
        let calls = Arc::new(AtomicUsize::new(0));

        let reader = {
            let cache = Arc::clone(&cache);
            let compute = slow_compute(id, &calls, Duration::from_secs(5));
            tokio::spawn(async move { cache.get_or_compute(id, compute).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        cache.invalidate(id);

        // the waiting reader still gets its answer
        assert!(reader.await.unwrap().is_ok());
        assert!(cache.cached(id).is_none());

        cache.get_or_compute(id, slow_compute(id, &calls, Duration::ZERO)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_after_invalidate_waits_for_superseded_flight() {
        let cache = Arc::new(ReportCache::new());
        let id = Uuid::new_v4();
        let overlap = Arc::new(Overlap::default());

        let first = {
            let cache = Arc::clone(&cache);
            let compute = tracked_compute(id, &overlap, Duration::from_secs(5));
            tokio::spawn(async move { cache.get_or_compute(id, compute).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        cache.invalidate(id);

        let second = {
            let cache = Arc::clone(&cache);
            let compute = tracked_compute(id, &overlap, Duration::from_secs(5));
            tokio::spawn(async move { cache.get_or_compute(id, compute).await })
        };
        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();

        assert_eq!(overlap.max.load(Ordering::SeqCst), 1);
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&cache.cached(id).unwrap(), &second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_computation_survives_caller_abort() {
        let cache = Arc::new(ReportCache::new());
        let id = Uuid::new_v4();
        let calls = Arc::new(AtomicUsize::new(0));

        let reader = {
            let cache = Arc::clone(&cache);
            let compute = slow_compute(id, &calls, Duration::from_secs(3));
            tokio::spawn(async move { cache.get_or_compute(id, compute).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        reader.abort();
        assert!(reader.await.unwrap_err().is_cancelled());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(cache.cached(id).is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_computation_is_reported_and_cleared() {
        let cache = ReportCache::new();
        let id = Uuid::new_v4();

        let result = cache
            .get_or_compute(id, || async move {
                let outcome: Result<Report, ReportError> = Err(ReportError::Storage(String::new()));
                if outcome.is_err() {
                    panic!("composition bug");
                }
                outcome
            })
            .await;
        assert!(matches!(result, Err(ReportError::Aborted(_))));

        let calls = Arc::new(AtomicUsize::new(0));
        cache.get_or_compute(id, slow_compute(id, &calls, Duration::ZERO)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_least_recently_read_report_is_evicted() {
        let cache = ReportCache::with_capacity(2);
        let calls = Arc::new(AtomicUsize::new(0));
        let [a, b, c] = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];

        for id in [a, b] {
            cache.get_or_compute(id, slow_compute(id, &calls, Duration::ZERO)).await.unwrap();
        }
        // touch `a` so `b` is the oldest
        cache.get_or_compute(a, slow_compute(a, &calls, Duration::ZERO)).await.unwrap();
        cache.get_or_compute(c, slow_compute(c, &calls, Duration::ZERO)).await.unwrap();

        assert!(cache.cached(a).is_some());
        assert!(cache.cached(b).is_none());
        assert!(cache.cached(c).is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
