//! Three-state circuit breaker guarding one upstream service.
//!
//! Distinct from the dispatcher's simpler open/closed breaker: this one has
//! a half-open probing state, matching the state machine in §4.1 —
//! `closed → open → half-open → closed`.

use std::{
    sync::Mutex,
    time::{Duration, Instant},
};

use moltis_config::schema::CircuitBreakerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: BreakerState,
    requests: u32,
    failures: u32,
    opened_at: Option<Instant>,
    half_open_inflight: u32,
}

/// Per-service circuit breaker. Cheap to construct; one lives per entry in
/// [`crate::state::AppState::breakers`].
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                requests: 0,
                failures: 0,
                opened_at: None,
                half_open_inflight: 0,
            }),
        }
    }

    /// Call before forwarding. `true` means the request may proceed; the
    /// caller must still call [`Self::record_success`] or
    /// [`Self::record_failure`] once the upstream call finishes.
    pub fn admit(&self) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or(Duration::ZERO);
                if elapsed >= Duration::from_secs(self.config.open_duration_secs) {
                    inner.state = BreakerState::HalfOpen;
                    inner.half_open_inflight = 1;
                    true
                } else {
                    false
                }
            },
            BreakerState::HalfOpen => {
                if inner.half_open_inflight < self.config.half_open_requests {
                    inner.half_open_inflight += 1;
                    true
                } else {
                    false
                }
            },
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match inner.state {
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Closed;
                inner.requests = 0;
                inner.failures = 0;
                inner.opened_at = None;
                inner.half_open_inflight = 0;
            },
            BreakerState::Closed => {
                inner.requests += 1;
                if inner.requests >= self.config.min_requests.max(64) {
                    inner.requests = 0;
                    inner.failures = 0;
                }
            },
            BreakerState::Open => {},
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match inner.state {
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                inner.half_open_inflight = 0;
            },
            BreakerState::Closed => {
                inner.requests += 1;
                inner.failures += 1;
                let ratio = f64::from(inner.failures) / f64::from(inner.requests);
                if inner.requests >= self.config.min_requests
                    && (inner.failures >= self.config.failure_threshold || ratio >= self.config.failure_ratio)
                {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                    moltis_metrics::counter!(moltis_metrics::gateway::CIRCUIT_BREAKER_OPEN_TOTAL).increment(1);
                }
            },
            BreakerState::Open => {},
        }
    }

    #[must_use]
    pub fn state(&self) -> BreakerState {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            failure_ratio: 0.6,
            min_requests: 3,
            open_duration_secs: 30,
            half_open_requests: 1,
        }
    }

    #[test]
    fn three_consecutive_failures_open_the_breaker() {
        let breaker = CircuitBreaker::new(config());
        for _ in 0..3 {
            assert!(breaker.admit());
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.admit());
    }

    #[test]
    fn half_open_success_closes_the_breaker() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            open_duration_secs: 0,
            ..config()
        });
        for _ in 0..3 {
            breaker.admit();
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(breaker.admit());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_failure_reopens() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            open_duration_secs: 0,
            ..config()
        });
        for _ in 0..3 {
            breaker.admit();
            breaker.record_failure();
        }
        assert!(breaker.admit());
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
    }
}
