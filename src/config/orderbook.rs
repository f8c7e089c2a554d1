//! Orderbook staleness configuration.

use serde::Deserialize;
use std::time::Duration;

use super::duration;

/// Orderbook freshness settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrderbookConfig {
    /// Maximum age of a cached snapshot before the detector treats it as
    /// absent. Zero disables the check.
    #[serde(with = "duration")]
    pub max_age: Duration,
}

impl Default for OrderbookConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(5),
        }
    }
}
