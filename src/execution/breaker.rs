//! Consecutive-failure circuit breaker.

use chrono::{DateTime, Duration, Utc};

use crate::config::{ExecutionConfig, duration};

/// CircuitBreaker pauses execution after a run of consecutive failures.
///
/// Closed until `threshold` failures in a row, then open for `pause`. There
/// is no half-open probe: it closes again once the pause has elapsed.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    threshold: u32,
    pause: Duration,
    consecutive_failures: u32,
    paused_until: Option<DateTime<Utc>>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, pause: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            pause,
            consecutive_failures: 0,
            paused_until: None,
        }
    }

    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self::new(config.failure_threshold, duration::to_chrono(config.pause))
    }

    /// Returns true while signals must be dropped.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.paused_until.is_some_and(|until| now < until)
    }

    /// Counts a failure. Returns true if this failure opened the breaker,
    /// in which case the counter starts over.
    pub fn record_failure_at(&mut self, now: DateTime<Utc>) -> bool {
        self.consecutive_failures += 1;
        if self.consecutive_failures < self.threshold {
            return false;
        }

        self.paused_until = Some(now + self.pause);
        self.consecutive_failures = 0;
        true
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn paused_until(&self) -> Option<DateTime<Utc>> {
        self.paused_until
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::from_config(&ExecutionConfig::default())
    }
}
