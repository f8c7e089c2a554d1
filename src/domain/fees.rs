//! Trading fee structures.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fees represents the trading fees charged by a venue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fees {
    /// Maker fee in basis points (for limit orders that add liquidity).
    pub maker_bps: Decimal,
    /// Taker fee in basis points (for orders that remove liquidity).
    /// Both legs of an arbitrage cross the book, so this is the fee
    /// used for profitability.
    pub taker_bps: Decimal,
}

impl Fees {
    /// Creates a new Fees instance.
    pub fn new(maker_bps: Decimal, taker_bps: Decimal) -> Self {
        Self {
            maker_bps,
            taker_bps,
        }
    }
}
