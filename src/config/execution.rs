//! Execution and circuit breaker configuration.

use serde::Deserialize;
use std::time::Duration;

use super::duration;

/// Execution engine settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Consecutive counted failures that open the circuit breaker.
    pub failure_threshold: u32,
    /// How long the breaker stays open once tripped.
    #[serde(with = "duration")]
    pub pause: Duration,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            pause: Duration::from_secs(5),
        }
    }
}
