//! Circuit breaker for the primary sentiment model.
//!
//! After `failure_threshold` consecutive primary failures (timeouts or
//! inference errors) the breaker trips and the scorer skips the primary for
//! the cooldown window, going straight to the lexicon fallback.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// State of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Normal operation: primary calls are allowed.
    Closed,
    /// Tripped: primary calls are skipped until cooldown expires.
    Open { tripped_at: Instant },
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    cooldown: Duration,
    failure_threshold: u32,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
            }),
            cooldown,
            failure_threshold: failure_threshold.max(1),
        }
    }

    /// Default breaker: trips after 3 consecutive failures, 60-second cooldown.
    pub fn default_primary() -> Self {
        Self::new(3, Duration::from_secs(60))
    }

    // A panic while holding the lock cannot leave the counters inconsistent,
    // so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a primary call may be attempted. An expired cooldown closes
    /// the breaker and clears the failure count.
    pub fn is_allowed(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open { tripped_at } => {
                if tripped_at.elapsed() >= self.cooldown {
                    inner.state = BreakerState::Closed;
                    inner.consecutive_failures = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful call; resets the failure counter.
    pub fn record_success(&self) {
        self.lock().consecutive_failures = 0;
    }

    /// Record a failure. Trips the breaker once the threshold is reached.
    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.failure_threshold {
            if let BreakerState::Closed = inner.state {
                tracing::warn!(
                    failures = inner.consecutive_failures,
                    cooldown_secs = self.cooldown.as_secs_f64(),
                    "primary sentiment circuit breaker tripped"
                );
            }
            inner.state = BreakerState::Open {
                tripped_at: Instant::now(),
            };
        }
    }

    /// Immediately trip the breaker.
    pub fn trip(&self) {
        self.lock().state = BreakerState::Open {
            tripped_at: Instant::now(),
        };
    }

    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    /// Time until the primary is retried; zero while closed.
    pub fn remaining_cooldown(&self) -> Duration {
        match self.lock().state {
            BreakerState::Closed => Duration::ZERO,
            BreakerState::Open { tripped_at } => self.cooldown.saturating_sub(tripped_at.elapsed()),
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::default_primary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32) -> CircuitBreaker {
        CircuitBreaker::new(threshold, Duration::from_secs(60))
    }

    #[test]
    fn fresh_breaker_admits_primary() {
        let cb = breaker(3);
        assert!(cb.is_allowed());
        assert_eq!(cb.state(), BreakerState::Closed);
        assert_eq!(cb.remaining_cooldown(), Duration::ZERO);
    }

    #[test]
    fn consecutive_timeouts_open_the_breaker() {
        let cb = breaker(3);
        for _ in 0..2 {
            cb.record_failure();
        }
        assert!(cb.is_allowed());

        cb.record_failure();
        assert!(matches!(cb.state(), BreakerState::Open { .. }));
        assert!(!cb.is_allowed());
        assert!(cb.remaining_cooldown() <= Duration::from_secs(60));
    }

    #[test]
    fn intermittent_failures_never_trip() {
        let cb = breaker(2);
        for _ in 0..10 {
            cb.record_failure();
            cb.record_success();
        }
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[test]
    fn zero_threshold_behaves_as_one() {
        let cb = breaker(0);
        cb.record_failure();
        assert!(!cb.is_allowed());
    }

    #[test]
    fn manual_trip_skips_primary() {
        let cb = CircuitBreaker::default();
        cb.trip();
        assert!(!cb.is_allowed());
        assert!(cb.remaining_cooldown() > Duration::ZERO);
    }

    #[test]
    fn cooldown_readmits_then_retrips_from_zero() {
        let cb = CircuitBreaker::new(2, Duration::from_millis(10));
        cb.record_failure();
        cb.record_failure();
        assert!(!cb.is_allowed());

        std::thread::sleep(Duration::from_millis(20));
        assert!(cb.is_allowed());
        assert_eq!(cb.state(), BreakerState::Closed);

        // The counter restarted, so one failure is not enough.
        cb.record_failure();
        assert!(cb.is_allowed());
        cb.record_failure();
        assert!(!cb.is_allowed());
    }
}
