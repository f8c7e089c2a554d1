//! Monitoring configuration.

use serde::Deserialize;
use std::time::Duration;

use super::duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Interval between stats snapshots in the log.
    #[serde(with = "duration")]
    pub stats_interval: Duration,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            stats_interval: Duration::from_secs(10),
        }
    }
}
