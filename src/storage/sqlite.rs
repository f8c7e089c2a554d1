//! SQLite implementation of TradeStore.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info};

use crate::domain::Opportunity;
use crate::storage::{StorageError, TradeRecord, TradeStore};

/// SqliteTradeStore implements TradeStore using SQLite.
pub struct SqliteTradeStore {
    pool: Pool<Sqlite>,
}

/// SqliteTradeStoreConfig holds SQLite storage configuration.
#[derive(Debug, Clone)]
pub struct SqliteTradeStoreConfig {
    /// Path to the SQLite database file.
    pub path: String,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
}

impl SqliteTradeStoreConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

impl Default for SqliteTradeStoreConfig {
    fn default() -> Self {
        Self {
            path: "data/trades.db".to_string(),
            max_connections: 5,
        }
    }
}

impl SqliteTradeStore {
    /// Opens (creating if needed) the database and its parent directory.
    pub async fn new(config: SqliteTradeStoreConfig) -> Result<Self, StorageError> {
        if let Some(parent) = Path::new(&config.path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", config.path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        let store = Self { pool };

        store.migrate().await?;

        info!(path = %config.path, "SQLite trade store initialized");
        Ok(store)
    }

    /// Runs database migrations to create the schema.
    async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id TEXT PRIMARY KEY,
                instrument TEXT NOT NULL,
                buy_venue TEXT NOT NULL,
                sell_venue TEXT NOT NULL,
                quantity TEXT NOT NULL,
                buy_price TEXT NOT NULL,
                sell_price TEXT NOT NULL,
                net_spread_bps TEXT NOT NULL,
                pnl TEXT NOT NULL,
                recorded_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_recorded_at ON trades(recorded_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl TradeStore for SqliteTradeStore {
    async fn record(&self, opportunity: &Opportunity, pnl: Decimal) -> Result<(), StorageError> {
        let record = TradeRecord::new(opportunity, pnl, Utc::now());

        sqlx::query(
            r#"
            INSERT INTO trades (
                id, instrument, buy_venue, sell_venue, quantity,
                buy_price, sell_price, net_spread_bps, pnl, recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                instrument = excluded.instrument,
                buy_venue = excluded.buy_venue,
                sell_venue = excluded.sell_venue,
                quantity = excluded.quantity,
                buy_price = excluded.buy_price,
                sell_price = excluded.sell_price,
                net_spread_bps = excluded.net_spread_bps,
                pnl = excluded.pnl,
                recorded_at = excluded.recorded_at
            "#,
        )
        .bind(&record.id)
        .bind(&record.instrument)
        .bind(&record.buy_venue)
        .bind(&record.sell_venue)
        .bind(record.quantity.to_string())
        .bind(record.buy_price.to_string())
        .bind(record.sell_price.to_string())
        .bind(record.net_spread_bps.to_string())
        .bind(record.pnl.to_string())
        .bind(record.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(id = %record.id, instrument = %record.instrument, pnl = %record.pnl, "Trade recorded");
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<TradeRecord>, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT id, instrument, buy_venue, sell_venue, quantity, buy_price,
                sell_price, net_spread_bps, pnl, recorded_at
            FROM trades WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(parse_trade_row).transpose()
    }

    async fn get_all(&self) -> Result<Vec<TradeRecord>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT id, instrument, buy_venue, sell_venue, quantity, buy_price,
                sell_price, net_spread_bps, pnl, recorded_at
            FROM trades ORDER BY recorded_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(parse_trade_row).collect()
    }

    async fn count(&self) -> Result<i64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM trades")
            .fetch_one(&self.pool)
            .await?;

        let count: i64 = row.try_get("count")?;
        Ok(count)
    }

    async fn total_pnl(&self) -> Result<Decimal, StorageError> {
        let rows = sqlx::query("SELECT pnl FROM trades")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().try_fold(Decimal::ZERO, |total, row| {
            Ok(total + decimal_column(row, "pnl")?)
        })
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.pool.close().await;
        Ok(())
    }
}

fn decimal_column(row: &SqliteRow, column: &str) -> Result<Decimal, StorageError> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str(&raw).map_err(|e| StorageError::InvalidData(format!("Invalid {}: {}", column, e)))
}

/// Parses a trade from a database row.
fn parse_trade_row(row: &SqliteRow) -> Result<TradeRecord, StorageError> {
    let recorded_at_str: String = row.try_get("recorded_at")?;
    let recorded_at = DateTime::parse_from_rfc3339(&recorded_at_str)
        .map_err(|e| StorageError::InvalidData(format!("Invalid recorded_at: {}", e)))?
        .with_timezone(&Utc);

    Ok(TradeRecord {
        id: row.try_get("id")?,
        instrument: row.try_get("instrument")?,
        buy_venue: row.try_get("buy_venue")?,
        sell_venue: row.try_get("sell_venue")?,
        quantity: decimal_column(row, "quantity")?,
        buy_price: decimal_column(row, "buy_price")?,
        sell_price: decimal_column(row, "sell_price")?,
        net_spread_bps: decimal_column(row, "net_spread_bps")?,
        pnl: decimal_column(row, "pnl")?,
        recorded_at,
    })
}
