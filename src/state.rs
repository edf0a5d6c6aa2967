//! Immutable state snapshots swapped atomically by the breaker.

use crate::clock::Clock;
use crate::config::CircuitBreakerConfig;
use crate::counter::{EventCounter, NoOpCounter, SlidingWindowCounter};
use crate::event_count::EventCount;
use std::sync::Arc;

/// Which of the three circuit states a [`State`] snapshot represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through; outcomes accumulate in a live sliding-window counter.
    Closed,
    /// Calls are short-circuited until the deadline elapses.
    Open,
    /// A single trial call is being probed.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        };
        f.write_str(s)
    }
}

/// The counter backing a [`State`]: a live sliding window in CLOSED, a
/// zero-cost no-op everywhere else.
#[derive(Debug)]
pub(crate) enum Counter {
    SlidingWindow(Arc<SlidingWindowCounter>),
    NoOp(NoOpCounter),
}

impl Counter {
    pub(crate) fn on_success(&self) {
        match self {
            Counter::SlidingWindow(c) => c.on_success(),
            Counter::NoOp(c) => c.on_success(),
        }
    }

    pub(crate) fn on_failure(&self) {
        match self {
            Counter::SlidingWindow(c) => c.on_failure(),
            Counter::NoOp(c) => c.on_failure(),
        }
    }

    pub(crate) fn count(&self) -> EventCount {
        match self {
            Counter::SlidingWindow(c) => c.count(),
            Counter::NoOp(c) => c.count(),
        }
    }
}

/// An immutable snapshot of the breaker's state: which state it's in, the
/// counter backing it, and (for OPEN/HALF_OPEN) the deadline at which it
/// becomes eligible to be superseded.
///
/// Never mutated in place — transitions replace the whole value via CAS on
/// the breaker's `ArcSwap<State>`.
#[derive(Debug)]
pub(crate) struct State {
    pub(crate) circuit_state: CircuitState,
    pub(crate) counter: Counter,
    /// Absolute monotonic nanosecond deadline. `0` means "never times out",
    /// which is only ever true for CLOSED.
    pub(crate) deadline_nanos: i64,
}

impl State {
    pub(crate) fn new_closed(clock: &Arc<dyn Clock>, config: &CircuitBreakerConfig) -> Self {
        let counter = SlidingWindowCounter::new(
            clock.clone(),
            config.counter_sliding_window(),
            config.counter_update_interval(),
        );
        Self {
            circuit_state: CircuitState::Closed,
            counter: Counter::SlidingWindow(Arc::new(counter)),
            deadline_nanos: 0,
        }
    }

    pub(crate) fn new_open(clock: &Arc<dyn Clock>, config: &CircuitBreakerConfig) -> Self {
        let now = clock.now_nanos();
        let deadline = now.saturating_add(config.circuit_open_window().as_nanos() as i64);
        Self { circuit_state: CircuitState::Open, counter: Counter::NoOp(NoOpCounter), deadline_nanos: deadline }
    }

    pub(crate) fn new_half_open(clock: &Arc<dyn Clock>, config: &CircuitBreakerConfig) -> Self {
        let now = clock.now_nanos();
        let deadline = now.saturating_add(config.trial_request_interval().as_nanos() as i64);
        Self {
            circuit_state: CircuitState::HalfOpen,
            counter: Counter::NoOp(NoOpCounter),
            deadline_nanos: deadline,
        }
    }

    /// True once `deadline_nanos` has elapsed. CLOSED's `deadline_nanos == 0`
    /// always reads as "not timed out".
    pub(crate) fn check_timeout(&self, now_nanos: i64) -> bool {
        self.deadline_nanos > 0 && self.deadline_nanos <= now_nanos
    }
}
