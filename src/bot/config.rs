//! Bot launch options.

use std::path::PathBuf;

use crate::config::Config;

/// Feed recorded snapshots from a file instead of the venue connectors.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    pub path: PathBuf,
    /// Playback speed multiplier; 2.0 halves the recorded delays.
    pub speed: f64,
}

/// Bot configuration options.
pub struct BotConfig {
    /// Application configuration.
    pub app_config: Config,
    /// Application version.
    pub version: String,
    /// Replay source, when running against a recording.
    pub replay: Option<ReplayConfig>,
}
