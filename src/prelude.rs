//! Convenient re-exports for common breaker-core types.
pub use crate::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder, CircuitBreakerRegistry,
    CircuitState, Clock, ConfigError, EventCount, EventCounter, ExceptionFilter, MonotonicClock,
};
