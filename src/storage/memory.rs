//! In-memory TradeStore used when persistence is disabled.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::domain::Opportunity;
use crate::storage::{StorageError, TradeRecord, TradeStore};

/// MemoryTradeStore keeps trades in a map keyed by opportunity id.
#[derive(Debug, Default)]
pub struct MemoryTradeStore {
    trades: RwLock<HashMap<String, TradeRecord>>,
}

impl MemoryTradeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TradeStore for MemoryTradeStore {
    async fn record(&self, opportunity: &Opportunity, pnl: Decimal) -> Result<(), StorageError> {
        let record = TradeRecord::new(opportunity, pnl, Utc::now());
        self.trades.write().await.insert(record.id.clone(), record);
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<TradeRecord>, StorageError> {
        Ok(self.trades.read().await.get(id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<TradeRecord>, StorageError> {
        let mut trades: Vec<TradeRecord> = self.trades.read().await.values().cloned().collect();
        trades.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at));
        Ok(trades)
    }

    async fn count(&self) -> Result<i64, StorageError> {
        Ok(self.trades.read().await.len() as i64)
    }

    async fn total_pnl(&self) -> Result<Decimal, StorageError> {
        Ok(self.trades.read().await.values().map(|t| t.pnl).sum())
    }

    async fn close(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
