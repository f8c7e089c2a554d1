//! Simulation (dry run) configuration.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Dry run settings. When enabled no orders reach the venues; fills,
/// extra slippage and balances are synthesized.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DryRunConfig {
    pub enabled: bool,
    /// Seed notional balance for every venue.
    pub start_balance: Decimal,
    /// Upper bound of the random extra slippage drawn per trade.
    pub max_slippage_bps: Decimal,
    /// Probability (percent) that a simulated trade fails.
    pub failure_chance_pct: Decimal,
    /// Seed for the engine and simulated feeds; entropy when absent.
    pub seed: Option<u64>,
}

impl Default for DryRunConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            start_balance: Decimal::from(2_000),
            max_slippage_bps: Decimal::from(10),
            failure_chance_pct: Decimal::from(5),
            seed: None,
        }
    }
}
