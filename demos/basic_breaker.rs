//! Minimal circuit breaker example: trip on repeated failures, recover via
//! a half-open trial once the open window elapses.
use breaker_core::{CircuitBreaker, CircuitBreakerConfig};
use std::thread::sleep;
use std::time::Duration;

fn call_flaky_service(attempt: usize) -> Result<&'static str, &'static str> {
    if attempt < 5 {
        Err("connection refused")
    } else {
        Ok("ok")
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let config = CircuitBreakerConfig::builder()
        .name("flaky-service")
        .failure_rate_threshold(0.5)
        .minimum_request_threshold(3)
        .circuit_open_window(Duration::from_millis(200))
        .trial_request_interval(Duration::from_millis(200))
        .build()
        .expect("valid breaker config");

    let breaker = CircuitBreaker::new(config);

    for attempt in 0..10 {
        if !breaker.can_request() {
            println!("attempt {attempt}: short-circuited ({:?})", breaker.state());
            sleep(Duration::from_millis(50));
            continue;
        }

        match call_flaky_service(attempt) {
            Ok(value) => {
                breaker.on_success();
                println!("attempt {attempt}: {value} ({:?})", breaker.state());
            }
            Err(cause) => {
                breaker.on_failure();
                println!("attempt {attempt}: failed ({cause}) ({:?})", breaker.state());
            }
        }
    }
}
