//! Storage interfaces and implementations for completed trades.

mod memory;
mod sqlite;

pub use memory::MemoryTradeStore;
pub use sqlite::{SqliteTradeStore, SqliteTradeStoreConfig};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::Opportunity;

/// TradeRecord is one completed trade as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Opportunity id; unique per trade.
    pub id: String,
    pub instrument: String,
    pub buy_venue: String,
    pub sell_venue: String,
    pub quantity: Decimal,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub net_spread_bps: Decimal,
    pub pnl: Decimal,
    pub recorded_at: DateTime<Utc>,
}

impl TradeRecord {
    pub fn new(opportunity: &Opportunity, pnl: Decimal, recorded_at: DateTime<Utc>) -> Self {
        Self {
            id: opportunity.id.clone(),
            instrument: opportunity.instrument.clone(),
            buy_venue: opportunity.buy_venue.clone(),
            sell_venue: opportunity.sell_venue.clone(),
            quantity: opportunity.quantity,
            buy_price: opportunity.buy_price,
            sell_price: opportunity.sell_price,
            net_spread_bps: opportunity.net_spread_bps,
            pnl,
            recorded_at,
        }
    }
}

/// TradeStore persists one record per completed trade.
///
/// Recording is idempotent on the opportunity id: a duplicate id overwrites
/// the previous record.
#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Records a completed trade.
    async fn record(&self, opportunity: &Opportunity, pnl: Decimal) -> Result<(), StorageError>;

    /// Retrieves a trade by opportunity id.
    async fn get_by_id(&self, id: &str) -> Result<Option<TradeRecord>, StorageError>;

    /// Retrieves all trades, oldest first.
    async fn get_all(&self) -> Result<Vec<TradeRecord>, StorageError>;

    /// Count returns the number of stored trades.
    async fn count(&self) -> Result<i64, StorageError>;

    /// Sum of realised PnL over all stored trades.
    async fn total_pnl(&self) -> Result<Decimal, StorageError>;

    /// Close releases the underlying resources.
    async fn close(&self) -> Result<(), StorageError>;
}

/// StorageError represents errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
