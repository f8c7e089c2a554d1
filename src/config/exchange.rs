//! Venue configuration.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

use super::duration;
use crate::domain::Fees;

/// How a venue connector obtains market data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Synthetic random-walk books, no network.
    #[default]
    Simulated,
    /// WebSocket depth stream.
    Streaming,
    /// Periodic REST depth snapshots.
    Polling,
}

/// Wire protocol spoken by a streaming venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamProtocol {
    /// Combined `<symbol>@depth20` partial book streams.
    Binance,
    /// `books5` channel subscription.
    Okx,
}

/// Settings for a single venue.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    /// Whether this venue should be used.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub transport: Transport,
    /// Required for the streaming transport.
    pub protocol: Option<StreamProtocol>,
    pub ws_url: Option<String>,
    /// Depth endpoint for the polling transport.
    pub rest_url: Option<String>,
    #[serde(default)]
    pub maker_fee_bps: Decimal,
    #[serde(default)]
    pub taker_fee_bps: Decimal,
    /// Smallest notional the venue accepts for one order.
    pub min_notional: Decimal,
    /// Largest notional we are willing to hold on this venue.
    pub max_position_notional: Decimal,
    /// Expected feed latency; also the simulated feed cadence floor.
    #[serde(default, with = "duration")]
    pub target_latency: Duration,
    #[serde(default = "default_poll_interval", with = "duration")]
    pub poll_interval: Duration,
    /// Number of book levels to request from the venue.
    pub depth: Option<u16>,
    /// Constant price skew of the simulated feed, in basis points.
    #[serde(default)]
    pub skew_bps: Decimal,
    /// WebSocket connection settings.
    pub websocket: Option<WebSocketConfig>,
}

impl ExchangeConfig {
    pub fn fees(&self) -> Fees {
        Fees::new(self.maker_fee_bps, self.taker_fee_bps)
    }
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

/// WebSocket connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    /// Interval between ping messages to keep connection alive.
    #[serde(default, with = "duration")]
    pub ping_interval: Duration,
    /// Delay before attempting to reconnect after disconnection.
    #[serde(default, with = "duration")]
    pub reconnect_delay: Duration,
}
