//! Order legs exchanged with venue connectors.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// OrderSide represents the direction of an order (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

/// OrderType represents the type of order execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Executes at the specified price or better.
    Limit,
    /// Executes immediately at the best available price.
    Market,
}

/// OrderStatus is the terminal state a venue reports for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Filled,
    Partial,
    Cancelled,
    Rejected,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Filled => write!(f, "filled"),
            OrderStatus::Partial => write!(f, "partial"),
            OrderStatus::Cancelled => write!(f, "cancelled"),
            OrderStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// OrderRequest is one leg sent to a venue connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub instrument: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    /// Limit price (ignored for market orders).
    pub price: Decimal,
    #[serde(rename = "type")]
    pub order_type: OrderType,
}

impl OrderRequest {
    /// Creates a limit order request.
    pub fn limit(
        instrument: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            side,
            quantity,
            price,
            order_type: OrderType::Limit,
        }
    }

    /// Returns price times quantity.
    pub fn notional(&self) -> Decimal {
        self.price * self.quantity
    }
}

/// OrderResult is the venue's answer to an order request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    pub order_id: String,
    pub filled_qty: Decimal,
    pub avg_price: Decimal,
    pub status: OrderStatus,
    pub completed_at: DateTime<Utc>,
}

impl OrderResult {
    pub fn is_filled(&self) -> bool {
        self.status == OrderStatus::Filled
    }
}

/// BalanceSummary is an asset balance reported by a venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSummary {
    pub venue: String,
    pub asset: String,
    pub free: Decimal,
    pub locked: Decimal,
    pub timestamp: DateTime<Utc>,
}
