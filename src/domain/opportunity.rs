//! Arbitrage opportunity, execution signal and execution report.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Opportunity represents a detected, time-boxed cross-venue dislocation
/// for one instrument and direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    /// Unique identifier for this opportunity.
    pub id: String,
    /// Instrument identifier (e.g., "BTCUSDT").
    pub instrument: String,
    /// Venue where to buy.
    pub buy_venue: String,
    /// Venue where to sell.
    pub sell_venue: String,
    /// Quantity to trade on both legs.
    pub quantity: Decimal,
    /// Effective (depth-weighted) ask price on the buy venue.
    pub buy_price: Decimal,
    /// Effective (depth-weighted) bid price on the sell venue.
    pub sell_price: Decimal,
    /// Net spread plus the slippage allowance of both legs.
    pub gross_spread_bps: Decimal,
    /// Spread after fees and slippage, in basis points.
    pub net_spread_bps: Decimal,
    /// When this opportunity was detected.
    pub detected_at: DateTime<Utc>,
    /// When this opportunity stops being actionable.
    pub expires_at: DateTime<Utc>,
}

impl Opportunity {
    /// Returns true if the opportunity has expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Direction label used in logs and cooldown keys ("A->B").
    pub fn direction(&self) -> String {
        format!("{}->{}", self.buy_venue, self.sell_venue)
    }
}

/// ExecutionSignal is a dispatch request for one opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSignal {
    pub opportunity: Opportunity,
    /// Maximum slippage tolerated on each leg's limit price.
    pub max_slippage_bps: Decimal,
    pub created_at: DateTime<Utc>,
}

/// ExecutionReport is the outcome of acting on a signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub opportunity_id: String,
    pub success: bool,
    pub filled_size: Option<Decimal>,
    pub pnl: Option<Decimal>,
    pub message: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl ExecutionReport {
    /// Creates a successful report.
    pub fn filled(
        opportunity_id: impl Into<String>,
        filled_size: Decimal,
        pnl: Decimal,
        message: Option<String>,
    ) -> Self {
        Self {
            opportunity_id: opportunity_id.into(),
            success: true,
            filled_size: Some(filled_size),
            pnl: Some(pnl),
            message,
            completed_at: Utc::now(),
        }
    }

    /// Creates a failure report carrying the reason.
    pub fn failed(opportunity_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            opportunity_id: opportunity_id.into(),
            success: false,
            filled_size: None,
            pnl: None,
            message: Some(message.into()),
            completed_at: Utc::now(),
        }
    }
}
