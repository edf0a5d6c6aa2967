//! Validated, immutable configuration for a [`crate::CircuitBreaker`].

use std::sync::Arc;
use std::time::Duration;

/// A pure predicate classifying a failure cause as countable (`true`) or
/// ignorable (`false`). Must not be relied on to never panic: a raising
/// filter is caught by the breaker and treated as "reject" (see
/// [`crate::CircuitBreaker::on_failure_because`]).
pub type ExceptionFilter =
    Arc<dyn Fn(&(dyn std::error::Error + Send + Sync)) -> bool + Send + Sync>;

/// Errors raised validating a [`CircuitBreakerConfig`] at construction time.
///
/// The breaker itself never surfaces errors once built; a bad configuration
/// fails loudly here instead of lazily at runtime.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq)]
#[non_exhaustive]
pub enum ConfigError {
    /// `failureRateThreshold` must be in `(0, 1]`.
    #[error("failure rate threshold must be in (0, 1], got {0}")]
    InvalidFailureRateThreshold(f64),
    /// `counterSlidingWindow` must be `> 0`.
    #[error("counter sliding window must be > 0")]
    ZeroSlidingWindow,
    /// `counterUpdateInterval` must be in `(0, counterSlidingWindow]`.
    #[error("counter update interval must be in (0, counterSlidingWindow], got {got:?} for window {window:?}")]
    InvalidUpdateInterval { got: Duration, window: Duration },
    /// `circuitOpenWindow` must be `> 0`.
    #[error("circuit open window must be > 0")]
    ZeroCircuitOpenWindow,
    /// `trialRequestInterval` must be `> 0`.
    #[error("trial request interval must be > 0")]
    ZeroTrialRequestInterval,
}

/// Immutable parameter bundle consumed by a [`crate::CircuitBreaker`].
///
/// Build via [`CircuitBreakerConfig::builder`]; construction validates every
/// field in one place and fails with a [`ConfigError`] rather than letting an
/// invalid breaker run.
#[derive(Clone)]
pub struct CircuitBreakerConfig {
    pub(crate) name: Option<String>,
    pub(crate) failure_rate_threshold: f64,
    pub(crate) minimum_request_threshold: u64,
    pub(crate) circuit_open_window: Duration,
    pub(crate) trial_request_interval: Duration,
    pub(crate) counter_sliding_window: Duration,
    pub(crate) counter_update_interval: Duration,
    pub(crate) exception_filter: ExceptionFilter,
}

impl std::fmt::Debug for CircuitBreakerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerConfig")
            .field("name", &self.name)
            .field("failure_rate_threshold", &self.failure_rate_threshold)
            .field("minimum_request_threshold", &self.minimum_request_threshold)
            .field("circuit_open_window", &self.circuit_open_window)
            .field("trial_request_interval", &self.trial_request_interval)
            .field("counter_sliding_window", &self.counter_sliding_window)
            .field("counter_update_interval", &self.counter_update_interval)
            .field("exception_filter", &"<predicate>")
            .finish()
    }
}

impl CircuitBreakerConfig {
    /// Start building a config from conservative defaults.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn failure_rate_threshold(&self) -> f64 {
        self.failure_rate_threshold
    }

    pub fn minimum_request_threshold(&self) -> u64 {
        self.minimum_request_threshold
    }

    pub fn circuit_open_window(&self) -> Duration {
        self.circuit_open_window
    }

    pub fn trial_request_interval(&self) -> Duration {
        self.trial_request_interval
    }

    pub fn counter_sliding_window(&self) -> Duration {
        self.counter_sliding_window
    }

    pub fn counter_update_interval(&self) -> Duration {
        self.counter_update_interval
    }

    pub(crate) fn exception_filter(&self) -> &ExceptionFilter {
        &self.exception_filter
    }

    /// `total > 0 && total >= minimumRequestThreshold && failureRate > failureRateThreshold`.
    ///
    /// Note the strict inequality on rate: a rate exactly at the threshold
    /// does not trip the breaker.
    pub(crate) fn exceeds_failure_threshold(&self, count: crate::EventCount) -> bool {
        let total = count.total();
        total > 0
            && total >= self.minimum_request_threshold
            && count.failure_rate() > self.failure_rate_threshold
    }
}

/// Builder for [`CircuitBreakerConfig`]. Setters are infallible; all range
/// checks happen once, in [`build`](Self::build).
pub struct CircuitBreakerConfigBuilder {
    name: Option<String>,
    failure_rate_threshold: f64,
    minimum_request_threshold: u64,
    circuit_open_window: Duration,
    trial_request_interval: Duration,
    counter_sliding_window: Duration,
    counter_update_interval: Duration,
    exception_filter: ExceptionFilter,
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self {
            name: None,
            failure_rate_threshold: 0.5,
            minimum_request_threshold: 10,
            circuit_open_window: Duration::from_secs(60),
            trial_request_interval: Duration::from_secs(60),
            counter_sliding_window: Duration::from_secs(60),
            counter_update_interval: Duration::from_secs(1),
            exception_filter: Arc::new(|_cause| true),
        }
    }
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn failure_rate_threshold(mut self, threshold: f64) -> Self {
        self.failure_rate_threshold = threshold;
        self
    }

    pub fn minimum_request_threshold(mut self, threshold: u64) -> Self {
        self.minimum_request_threshold = threshold;
        self
    }

    pub fn circuit_open_window(mut self, window: Duration) -> Self {
        self.circuit_open_window = window;
        self
    }

    pub fn trial_request_interval(mut self, interval: Duration) -> Self {
        self.trial_request_interval = interval;
        self
    }

    pub fn counter_sliding_window(mut self, window: Duration) -> Self {
        self.counter_sliding_window = window;
        self
    }

    pub fn counter_update_interval(mut self, interval: Duration) -> Self {
        self.counter_update_interval = interval;
        self
    }

    /// Install a predicate classifying which failure causes count against
    /// the breaker. A cause rejected by the filter (or one that makes the
    /// filter panic) is never counted.
    pub fn exception_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&(dyn std::error::Error + Send + Sync)) -> bool + Send + Sync + 'static,
    {
        self.exception_filter = Arc::new(filter);
        self
    }

    pub fn build(self) -> Result<CircuitBreakerConfig, ConfigError> {
        if !(self.failure_rate_threshold > 0.0 && self.failure_rate_threshold <= 1.0) {
            return Err(ConfigError::InvalidFailureRateThreshold(self.failure_rate_threshold));
        }
        if self.counter_sliding_window.is_zero() {
            return Err(ConfigError::ZeroSlidingWindow);
        }
        if self.counter_update_interval.is_zero()
            || self.counter_update_interval > self.counter_sliding_window
        {
            return Err(ConfigError::InvalidUpdateInterval {
                got: self.counter_update_interval,
                window: self.counter_sliding_window,
            });
        }
        if self.circuit_open_window.is_zero() {
            return Err(ConfigError::ZeroCircuitOpenWindow);
        }
        if self.trial_request_interval.is_zero() {
            return Err(ConfigError::ZeroTrialRequestInterval);
        }

        Ok(CircuitBreakerConfig {
            name: self.name,
            failure_rate_threshold: self.failure_rate_threshold,
            minimum_request_threshold: self.minimum_request_threshold,
            circuit_open_window: self.circuit_open_window,
            trial_request_interval: self.trial_request_interval,
            counter_sliding_window: self.counter_sliding_window,
            counter_update_interval: self.counter_update_interval,
            exception_filter: self.exception_filter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build_successfully() {
        assert!(CircuitBreakerConfig::builder().build().is_ok());
    }

    #[test]
    fn rejects_zero_failure_rate_threshold() {
        let err = CircuitBreakerConfig::builder().failure_rate_threshold(0.0).build().unwrap_err();
        assert_eq!(err, ConfigError::InvalidFailureRateThreshold(0.0));
    }

    #[test]
    fn rejects_failure_rate_threshold_above_one() {
        let err = CircuitBreakerConfig::builder().failure_rate_threshold(1.5).build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFailureRateThreshold(_)));
    }

    #[test]
    fn accepts_failure_rate_threshold_of_exactly_one() {
        assert!(CircuitBreakerConfig::builder().failure_rate_threshold(1.0).build().is_ok());
    }

    #[test]
    fn rejects_update_interval_larger_than_window() {
        let err = CircuitBreakerConfig::builder()
            .counter_sliding_window(Duration::from_secs(10))
            .counter_update_interval(Duration::from_secs(20))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUpdateInterval { .. }));
    }

    #[test]
    fn rejects_zero_circuit_open_window() {
        let err = CircuitBreakerConfig::builder()
            .circuit_open_window(Duration::ZERO)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroCircuitOpenWindow);
    }
}
