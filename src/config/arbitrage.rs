//! Opportunity detection configuration.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

use super::duration;

/// Cross-venue detection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArbitrageConfig {
    /// Expected slippage per leg in basis points, charged twice in the net spread.
    pub slippage_bps: Decimal,
    /// Minimum net spread in basis points required to emit a signal.
    pub min_net_spread_bps: Decimal,
    /// Maximum number of unresolved signals at any time.
    pub max_concurrent_signals: usize,
    /// Lifetime of an opportunity, also the per-direction cooldown.
    #[serde(with = "duration")]
    pub signal_ttl: Duration,
    /// Minimum interval between two "missing book" log lines per instrument.
    #[serde(with = "duration")]
    pub gap_log_interval: Duration,
}

impl Default for ArbitrageConfig {
    fn default() -> Self {
        Self {
            slippage_bps: Decimal::from(5),
            min_net_spread_bps: Decimal::from(15),
            max_concurrent_signals: 3,
            signal_ttl: Duration::from_secs(2),
            gap_log_interval: Duration::from_secs(5),
        }
    }
}
