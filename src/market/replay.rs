//! Replays recorded order book frames into the pipeline.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::domain::OrderBookSnapshot;
use crate::exchanges::VenueEvent;

/// Delay used when a frame does not specify one.
const DEFAULT_FRAME_DELAY_MS: u64 = 200;

/// Floor for the wait between two frames.
const MIN_FRAME_DELAY: Duration = Duration::from_millis(50);

/// Ceiling for the wait between two frames.
const MAX_FRAME_DELAY: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read replay file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse replay file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("speed must be positive, got {0}")]
    InvalidSpeed(f64),
}

/// One recorded snapshot plus the delay to wait before publishing it.
#[derive(Debug, Deserialize)]
struct ReplayFrame {
    #[serde(flatten)]
    snapshot: OrderBookSnapshot,
    delay_ms: Option<u64>,
}

/// Returns the wait before a frame given its recorded delay and speed factor.
fn frame_delay(delay_ms: Option<u64>, speed: f64) -> Duration {
    let recorded = delay_ms.unwrap_or(DEFAULT_FRAME_DELAY_MS) as f64;
    Duration::try_from_secs_f64(recorded / speed / 1000.0)
        .unwrap_or(MAX_FRAME_DELAY)
        .clamp(MIN_FRAME_DELAY, MAX_FRAME_DELAY)
}

/// Reads a JSON array of frames from `path` and forwards each one as a
/// venue order book event. Frames are stamped with the local receive time.
///
/// Returns the number of frames published.
pub async fn replay_file(
    path: &Path,
    speed: f64,
    events: mpsc::UnboundedSender<VenueEvent>,
) -> Result<usize, ReplayError> {
    if !(speed > 0.0) {
        return Err(ReplayError::InvalidSpeed(speed));
    }

    let raw = tokio::fs::read_to_string(path).await?;
    let frames: Vec<ReplayFrame> = serde_json::from_str(&raw)?;
    let total = frames.len();
    let mut published = 0;

    for frame in frames {
        tokio::time::sleep(frame_delay(frame.delay_ms, speed)).await;

        let recorded = frame.snapshot;
        let snapshot = OrderBookSnapshot::new(
            recorded.venue,
            recorded.instrument,
            recorded.bids,
            recorded.asks,
            recorded.sequence,
            Utc::now(),
        );

        if events.send(VenueEvent::OrderBook(snapshot)).is_err() {
            warn!(published, total, "pipeline closed, stopping replay");
            break;
        }
        published += 1;
    }

    info!(frames = published, source = %path.display(), "Paper replay finished");

    Ok(published)
}
