//! Bot error types.

use crate::config::ConfigError;
use crate::exchanges::ExchangeError;
use crate::market::replay::ReplayError;
use crate::storage::StorageError;

/// Bot error type.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("exchange error: {0}")]
    Exchange(#[from] ExchangeError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("replay error: {0}")]
    Replay(#[from] ReplayError),
    #[error("task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
