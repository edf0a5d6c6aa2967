//! Registry for looking up named circuit breakers by ID.
//!
//! Not a policy-composition or call-interception facade — just a name to
//! handle map, so a process hosting many breakers can inspect or reset one
//! without the caller threading a reference through application code.

use crate::circuit_breaker::CircuitBreaker;
use crate::state::CircuitState;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Registry of circuit breakers keyed by name.
#[derive(Default, Clone)]
pub struct CircuitBreakerRegistry {
    inner: Arc<Mutex<HashMap<String, Arc<CircuitBreaker>>>>,
}

impl std::fmt::Debug for CircuitBreakerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> =
            self.inner.lock().unwrap().keys().cloned().collect();
        f.debug_struct("CircuitBreakerRegistry").field("breakers", &names).finish()
    }
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `breaker` under `breaker.name()`. Overwrites any existing
    /// entry with the same name.
    pub fn register(&self, breaker: Arc<CircuitBreaker>) {
        self.inner.lock().unwrap().insert(breaker.name().to_string(), breaker);
    }

    /// Look up a breaker by name.
    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.inner.lock().unwrap().get(name).cloned()
    }

    /// Reset a registered breaker back to CLOSED by name.
    ///
    /// Errors if no breaker is registered under `name`; resetting a breaker
    /// never fails once it's found.
    pub fn reset(&self, name: &str) -> Result<(), String> {
        match self.get(name) {
            Some(breaker) => {
                breaker.reset();
                Ok(())
            }
            None => Err(format!("breaker not found: {name}")),
        }
    }

    /// Current state of every registered breaker, sorted by name.
    pub fn snapshot(&self) -> Vec<(String, CircuitState)> {
        let map = self.inner.lock().unwrap();
        let mut entries: Vec<(String, CircuitState)> =
            map.iter().map(|(name, cb)| (name.clone(), cb.state())).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}
