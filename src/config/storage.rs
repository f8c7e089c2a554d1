//! Storage configuration.

use serde::Deserialize;

/// Trade storage settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Whether trades are persisted to SQLite. In-memory otherwise.
    pub enabled: bool,
    /// Path to the SQLite database file.
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: "data/trades.db".to_string(),
        }
    }
}
