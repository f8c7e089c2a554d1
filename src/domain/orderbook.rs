//! Order book snapshot data structures.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// PriceLevel represents a single price rung in the order book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub size: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }

    /// Returns true if both price and size are positive.
    pub fn is_valid(&self) -> bool {
        self.price > Decimal::ZERO && self.size > Decimal::ZERO
    }
}

/// OrderBookSnapshot is a venue's book for one instrument at one instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    /// Venue name this book belongs to.
    pub venue: String,
    /// Instrument identifier (e.g., "BTCUSDT").
    pub instrument: String,
    /// Bid levels sorted by descending price (best first).
    #[serde(default)]
    pub bids: Vec<PriceLevel>,
    /// Ask levels sorted by ascending price (best first).
    #[serde(default)]
    pub asks: Vec<PriceLevel>,
    /// Venue sequence id of this update.
    #[serde(default)]
    pub sequence: u64,
    /// When this snapshot was received locally.
    #[serde(default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

impl OrderBookSnapshot {
    /// Builds a snapshot from raw levels, dropping empty or non-positive
    /// rungs and restoring best-first ordering on both sides.
    pub fn new(
        venue: impl Into<String>,
        instrument: impl Into<String>,
        bids: Vec<PriceLevel>,
        asks: Vec<PriceLevel>,
        sequence: u64,
        received_at: DateTime<Utc>,
    ) -> Self {
        let mut bids: Vec<PriceLevel> = bids.into_iter().filter(PriceLevel::is_valid).collect();
        let mut asks: Vec<PriceLevel> = asks.into_iter().filter(PriceLevel::is_valid).collect();
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        asks.sort_by(|a, b| a.price.cmp(&b.price));

        Self {
            venue: venue.into(),
            instrument: instrument.into(),
            bids,
            asks,
            sequence,
            received_at,
        }
    }

    /// Returns the best bid level, if available.
    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first()
    }

    /// Returns the best ask level, if available.
    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first()
    }

    /// Returns best bid minus best ask. Negative for a normal book.
    pub fn top_of_book_spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(bid.price - ask.price),
            _ => None,
        }
    }

    /// Returns how old this snapshot is at `now`.
    pub fn age_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.received_at
    }
}
