//! Thread-safe event counters backing the CLOSED-state failure-rate check.
//!
//! Two variants: [`SlidingWindowCounter`], which actually accumulates
//! success/failure counts over a rolling window, and [`NoOpCounter`], a
//! zero-cost stand-in used while the breaker is OPEN or HALF_OPEN (accounting
//! is pointless once the circuit has already tripped).

use crate::clock::Clock;
use crate::event_count::EventCount;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Accumulates success/failure outcomes and reports a windowed snapshot.
///
/// Implementations must be safe under arbitrary concurrent callers. `count()`
/// is a best-effort consistent snapshot: success and failure are drawn from
/// the same logical window, but accuracy at bucket boundaries is approximate
/// (skew of at most one `counterUpdateInterval` is acceptable).
pub trait EventCounter: Send + Sync + std::fmt::Debug {
    /// Record one success in the current window.
    fn on_success(&self);
    /// Record one failure in the current window.
    fn on_failure(&self);
    /// Snapshot of the aggregated counts over the window ending "now".
    fn count(&self) -> EventCount;
}

/// Sentinel epoch marking a bucket slot that has never been written.
const UNSET_EPOCH: i64 = i64::MIN;

#[derive(Debug)]
struct Bucket {
    /// Which `counterUpdateInterval`-sized interval this bucket currently
    /// belongs to. Buckets are reused (ring-indexed) rather than allocated
    /// per interval, so the epoch disambiguates "this slot's data is current"
    /// from "this slot's data is leftover from several laps ago".
    epoch: AtomicI64,
    success: AtomicU64,
    failure: AtomicU64,
}

impl Bucket {
    fn new() -> Self {
        Self {
            epoch: AtomicI64::new(UNSET_EPOCH),
            success: AtomicU64::new(0),
            failure: AtomicU64::new(0),
        }
    }
}

/// A rolling failure-rate counter over a window of length `W`, divided into
/// `ceil(W / counterUpdateInterval)` ring-indexed buckets.
///
/// Each bucket is tagged with the interval index it was last sealed for.
/// A caller that lands in a bucket tagged for an older interval rotates it
/// by CAS-ing the epoch forward and, only upon winning that CAS, zeroing its
/// counters; losers of that CAS simply proceed to increment the (now-current)
/// bucket, which is the lock-free idiom: only one thread performs the
/// rotation, everyone else retries the cheap increment. `count()` sums every bucket whose epoch
/// still falls within the trailing window, which is the ring-buffer
/// rendering of "archived sum + current bucket": a bucket that fell more
/// than `W` out of date simply reads as empty until it is next rotated.
#[derive(Debug)]
pub struct SlidingWindowCounter {
    clock: Arc<dyn Clock>,
    update_interval_nanos: i64,
    buckets: Vec<Bucket>,
}

impl SlidingWindowCounter {
    /// `window` is the total sliding window length; `update_interval` is the
    /// width of each bucket and must be `> 0` and `<= window`.
    pub fn new(clock: Arc<dyn Clock>, window: Duration, update_interval: Duration) -> Self {
        debug_assert!(!update_interval.is_zero());
        debug_assert!(update_interval <= window);
        let update_interval_nanos = update_interval.as_nanos().max(1) as i64;
        let window_nanos = window.as_nanos() as i64;
        let num_buckets = ((window_nanos + update_interval_nanos - 1) / update_interval_nanos)
            .max(1) as usize;
        let buckets = (0..num_buckets).map(|_| Bucket::new()).collect();
        Self { clock, update_interval_nanos, buckets }
    }

    fn interval_index(&self, now_nanos: i64) -> i64 {
        now_nanos.div_euclid(self.update_interval_nanos)
    }

    fn slot(&self, interval_index: i64) -> usize {
        interval_index.rem_euclid(self.buckets.len() as i64) as usize
    }

    /// Rotate `bucket` forward into `interval_index` if it's behind.
    ///
    /// The epoch only ever moves forward: a thread whose own `now` reads as
    /// `interval_index` but finds the bucket already tagged for an epoch
    /// `>= interval_index` (because some other thread, scheduled later but
    /// reading a later "now", already rotated it) does not touch the bucket
    /// at all — its own observation is the stale one, and its increment
    /// belongs in whatever epoch the bucket already holds. Only a thread that
    /// observes a genuinely older epoch attempts to CAS it forward, and only
    /// the winner of that CAS zeroes the counters, strictly after the CAS
    /// succeeds. This combination — forward-only epoch motion, zero-after-not-
    /// before — is what keeps a late-arriving, stale writer from rolling the
    /// epoch backward and erasing data a bucket another thread already
    /// rotated forward and is actively incrementing; that failure mode was
    /// otherwise reachable whenever `interval_index` could alias onto the
    /// same bucket as a newer epoch, which the degenerate single-bucket case
    /// (window == update interval) hits on every rotation. Losers of the CAS
    /// simply retry from the epoch they lost against, until either they win
    /// or they observe the bucket has already reached/passed their target.
    fn rotate_if_stale(bucket: &Bucket, interval_index: i64) {
        let mut current = bucket.epoch.load(Ordering::Acquire);
        loop {
            if current >= interval_index {
                return;
            }
            match bucket.epoch.compare_exchange(
                current,
                interval_index,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    bucket.success.store(0, Ordering::Relaxed);
                    bucket.failure.store(0, Ordering::Relaxed);
                    return;
                }
                Err(actual) => {
                    current = actual;
                }
            }
        }
    }

    fn record(&self, success: bool) {
        let now = self.clock.now_nanos();
        let idx = self.interval_index(now);
        let bucket = &self.buckets[self.slot(idx)];
        Self::rotate_if_stale(bucket, idx);
        if success {
            bucket.success.fetch_add(1, Ordering::Relaxed);
        } else {
            bucket.failure.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl EventCounter for SlidingWindowCounter {
    fn on_success(&self) {
        self.record(true);
    }

    fn on_failure(&self) {
        self.record(false);
    }

    fn count(&self) -> EventCount {
        let now = self.clock.now_nanos();
        let current_idx = self.interval_index(now);
        let oldest_live_idx = current_idx - self.buckets.len() as i64 + 1;

        let mut success = 0u64;
        let mut failure = 0u64;
        for bucket in &self.buckets {
            let epoch = bucket.epoch.load(Ordering::Acquire);
            if epoch == UNSET_EPOCH || epoch < oldest_live_idx || epoch > current_idx {
                continue;
            }
            success += bucket.success.load(Ordering::Relaxed);
            failure += bucket.failure.load(Ordering::Relaxed);
        }
        EventCount::new(success, failure)
    }
}

/// A counter that records nothing. Used in OPEN and HALF_OPEN so that
/// accounting cost is zero while the breaker is tripped.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCounter;

impl EventCounter for NoOpCounter {
    fn on_success(&self) {}
    fn on_failure(&self) {}
    fn count(&self) -> EventCount {
        EventCount::ZERO
    }
}
