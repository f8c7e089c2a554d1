//! Common utilities for connector implementations.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::{OrderBookSnapshot, PriceLevel};

/// Quote assets recognised when splitting a concatenated symbol.
const KNOWN_QUOTES: [&str; 3] = ["USDT", "USDC", "USD"];

/// Converts "BTCUSDT" to "BTC-USDT". Returns None for unknown quotes.
pub fn instrument_to_dashed(instrument: &str) -> Option<String> {
    let quote = KNOWN_QUOTES.iter().find(|q| instrument.ends_with(*q))?;
    let base = &instrument[..instrument.len() - quote.len()];
    if base.is_empty() {
        return None;
    }
    Some(format!("{}-{}", base, quote))
}

/// Converts "BTC-USDT" to "BTCUSDT".
pub fn dashed_to_instrument(symbol: &str) -> String {
    symbol.replace('-', "")
}

/// Parses `[[price, size, ...], ...]` string arrays into price levels.
/// Malformed and zero-size rungs are skipped.
pub fn parse_levels(levels: &[Vec<String>]) -> Vec<PriceLevel> {
    levels
        .iter()
        .filter_map(|level| {
            if level.len() < 2 {
                return None;
            }
            let price = Decimal::from_str(&level[0]).ok()?;
            let size = Decimal::from_str(&level[1]).ok()?;
            if size.is_zero() {
                return None;
            }
            Some(PriceLevel { price, size })
        })
        .collect()
}

/// Binance-style depth payload. Accepts both the partial book shape
/// (`lastUpdateId`, `bids`, `asks`) and the diff shape (`s`, `u`, `b`, `a`).
#[derive(Debug, Deserialize)]
pub struct DepthData {
    #[serde(default, alias = "s")]
    pub symbol: Option<String>,
    #[serde(default, rename = "lastUpdateId", alias = "u")]
    pub last_update_id: u64,
    #[serde(default, alias = "b")]
    pub bids: Vec<Vec<String>>,
    #[serde(default, alias = "a")]
    pub asks: Vec<Vec<String>>,
}

impl DepthData {
    /// Converts the payload into a snapshot for `venue`/`instrument`.
    pub fn into_snapshot(self, venue: &str, instrument: &str, now: DateTime<Utc>) -> OrderBookSnapshot {
        OrderBookSnapshot::new(
            venue,
            instrument,
            parse_levels(&self.bids),
            parse_levels(&self.asks),
            self.last_update_id,
            now,
        )
    }
}
