//! Configuration loading and validation.
//!
//! Uses serde_yaml to load YAML configuration files. A few switches can be
//! overridden from the environment (`DRY_RUN`, `PAIRS`), mirroring how the
//! process is usually launched from a `.env` file.

mod app;
mod arbitrage;
mod dry_run;
pub mod duration;
mod error;
mod exchange;
mod execution;
mod monitoring;
mod orderbook;
mod storage;

pub use app::{AppConfig, AppEnv};
pub use arbitrage::ArbitrageConfig;
pub use dry_run::DryRunConfig;
pub use error::ConfigError;
pub use exchange::{ExchangeConfig, StreamProtocol, Transport, WebSocketConfig};
pub use execution::ExecutionConfig;
pub use monitoring::MonitoringConfig;
pub use orderbook::OrderbookConfig;
pub use storage::StorageConfig;

use rust_decimal::Decimal;
use serde::Deserialize;
use std::{collections::HashMap, env, fs, time::Duration};

/// Number of venues the detector arbitrages between.
pub const REQUIRED_VENUES: usize = 2;

/// Upper bound for durations that get added to timestamps.
pub const MAX_TIMER_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Root configuration structure.
///
/// Required sections: app, exchanges, pairs. Everything else has defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    /// Maps venue names to their configurations.
    pub exchanges: HashMap<String, ExchangeConfig>,
    /// Instruments to monitor (e.g., "BTCUSDT").
    pub pairs: Vec<String>,
    #[serde(default)]
    pub orderbook: OrderbookConfig,
    #[serde(default)]
    pub arbitrage: ArbitrageConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub dry_run: DryRunConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl Config {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Loads `.env` first (if present), then the YAML file, then applies
    /// `DRY_RUN` and `PAIRS` overrides and validates the result.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_string(),
            source,
        })?;
        let mut config = Self::from_yaml(&content)?;

        config.apply_overrides(env::var("DRY_RUN").ok(), env::var("PAIRS").ok());
        config.validate()?;

        Ok(config)
    }

    /// Parses configuration from a YAML string without validating it.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Applies environment-style overrides.
    fn apply_overrides(&mut self, dry_run: Option<String>, pairs: Option<String>) {
        if let Some(flag) = dry_run {
            self.dry_run.enabled = flag.trim().eq_ignore_ascii_case("true");
        }

        if let Some(pairs) = pairs {
            let parsed: Vec<String> = pairs
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
            if !parsed.is_empty() {
                self.pairs = parsed;
            }
        }
    }

    /// Returns enabled venues sorted by name.
    pub fn enabled_venues(&self) -> Vec<(&str, &ExchangeConfig)> {
        let mut venues: Vec<(&str, &ExchangeConfig)> = self
            .exchanges
            .iter()
            .filter(|(_, ex)| ex.enabled)
            .map(|(name, ex)| (name.as_str(), ex))
            .collect();
        venues.sort_by(|a, b| a.0.cmp(b.0));
        venues
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app.name.is_empty() {
            return Err(ConfigError::Validation("app.name is required".into()));
        }

        if self.pairs.is_empty() {
            return Err(ConfigError::Validation(
                "at least one trading pair is required".into(),
            ));
        }

        let venues = self.enabled_venues();
        if venues.len() != REQUIRED_VENUES {
            return Err(ConfigError::Validation(format!(
                "exactly {} exchanges must be enabled, found {}",
                REQUIRED_VENUES,
                venues.len()
            )));
        }

        for (name, exchange) in venues {
            if exchange.min_notional <= Decimal::ZERO {
                return Err(ConfigError::Validation(format!(
                    "exchange {}: min_notional must be positive",
                    name
                )));
            }

            if exchange.max_position_notional <= Decimal::ZERO {
                return Err(ConfigError::Validation(format!(
                    "exchange {}: max_position_notional must be positive",
                    name
                )));
            }

            if exchange.maker_fee_bps < Decimal::ZERO || exchange.taker_fee_bps < Decimal::ZERO {
                return Err(ConfigError::Validation(format!(
                    "exchange {}: fees must not be negative",
                    name
                )));
            }

            match exchange.transport {
                Transport::Streaming if exchange.protocol.is_none() || exchange.ws_url.is_none() => {
                    return Err(ConfigError::Validation(format!(
                        "exchange {}: streaming transport requires protocol and ws_url",
                        name
                    )));
                }
                Transport::Polling if exchange.rest_url.is_none() => {
                    return Err(ConfigError::Validation(format!(
                        "exchange {}: polling transport requires rest_url",
                        name
                    )));
                }
                _ => {}
            }
        }

        if self.arbitrage.slippage_bps < Decimal::ZERO {
            return Err(ConfigError::Validation(
                "arbitrage.slippage_bps must not be negative".into(),
            ));
        }

        if self.arbitrage.min_net_spread_bps < Decimal::ZERO {
            return Err(ConfigError::Validation(
                "arbitrage.min_net_spread_bps must not be negative".into(),
            ));
        }

        if self.arbitrage.max_concurrent_signals == 0 {
            return Err(ConfigError::Validation(
                "arbitrage.max_concurrent_signals must be positive".into(),
            ));
        }

        if self.arbitrage.signal_ttl.is_zero() {
            return Err(ConfigError::Validation(
                "arbitrage.signal_ttl must be positive".into(),
            ));
        }

        for (field, value) in [
            ("arbitrage.signal_ttl", self.arbitrage.signal_ttl),
            ("arbitrage.gap_log_interval", self.arbitrage.gap_log_interval),
            ("execution.pause", self.execution.pause),
        ] {
            if value > MAX_TIMER_DURATION {
                return Err(ConfigError::Validation(format!(
                    "{} must not exceed {:?}",
                    field, MAX_TIMER_DURATION
                )));
            }
        }

        if self.execution.failure_threshold == 0 {
            return Err(ConfigError::Validation(
                "execution.failure_threshold must be positive".into(),
            ));
        }

        let dry_run = &self.dry_run;
        if dry_run.start_balance < Decimal::ZERO || dry_run.max_slippage_bps < Decimal::ZERO {
            return Err(ConfigError::Validation(
                "dry_run.start_balance and dry_run.max_slippage_bps must not be negative".into(),
            ));
        }

        if dry_run.failure_chance_pct < Decimal::ZERO
            || dry_run.failure_chance_pct > Decimal::ONE_HUNDRED
        {
            return Err(ConfigError::Validation(
                "dry_run.failure_chance_pct must be within 0..=100".into(),
            ));
        }

        Ok(())
    }
}
