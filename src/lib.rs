#![forbid(unsafe_code)]

//! # breaker-core
//!
//! A non-blocking circuit breaker: a small state machine that sits in front
//! of calls to a remote service, observes success/failure outcomes, and
//! short-circuits new calls when the remote is deemed unhealthy.
//!
//! ## Scope
//!
//! This crate is the concurrency core only — the lock-free CLOSED / OPEN /
//! HALF_OPEN state machine and the windowed failure-rate counter behind it.
//! Wiring a breaker into a particular RPC client (call interception,
//! response classification), composing it with other resilience policies,
//! and emitting metrics beyond the raw counts [`CircuitBreaker::metrics`]
//! exposes are all left to callers one layer up.
//!
//! ## Quick start
//!
//! ```
//! use breaker_core::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! let config = CircuitBreakerConfig::builder()
//!     .name("payments-api")
//!     .failure_rate_threshold(0.5)
//!     .minimum_request_threshold(10)
//!     .circuit_open_window(Duration::from_secs(30))
//!     .trial_request_interval(Duration::from_secs(30))
//!     .build()
//!     .expect("valid breaker config");
//!
//! let breaker = CircuitBreaker::new(config);
//!
//! if breaker.can_request() {
//!     // call the downstream service, then report the outcome:
//!     breaker.on_success();
//!     // or, on failure: breaker.on_failure();
//! }
//! ```

mod circuit_breaker;
mod clock;
mod config;
mod counter;
mod event_count;
mod registry;
mod state;

pub use circuit_breaker::CircuitBreaker;
pub use clock::{Clock, MonotonicClock};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder, ConfigError, ExceptionFilter};
pub use counter::{EventCounter, NoOpCounter, SlidingWindowCounter};
pub use event_count::EventCount;
pub use registry::CircuitBreakerRegistry;
pub use state::CircuitState;

pub mod prelude;
