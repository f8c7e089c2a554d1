//! Periodic metrics logging.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::info;

use super::Stats;
use crate::domain::{ExecutionReport, ExecutionSignal};
use crate::events::EventBus;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Counts signals and execution reports and logs them every `interval`.
pub struct StatsCollector {
    signals: mpsc::UnboundedReceiver<ExecutionSignal>,
    executions: mpsc::UnboundedReceiver<ExecutionReport>,
    interval: Duration,
    stats: Stats,
}

impl StatsCollector {
    /// Subscribes to the signal and execution topics. Must be called while
    /// the bus is still being wired.
    pub fn subscribe(bus: &mut EventBus, interval: Duration) -> Self {
        Self {
            signals: bus.subscribe_signals(),
            executions: bus.subscribe_executions(),
            interval: if interval.is_zero() { DEFAULT_INTERVAL } else { interval },
            stats: Stats::default(),
        }
    }

    /// Runs until `shutdown` fires or both topics close, then drains what is
    /// queued, logs a final snapshot and returns the totals.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Stats {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                Some(signal) = self.signals.recv() => self.stats.on_signal(&signal),
                Some(report) = self.executions.recv() => self.stats.on_report(&report),
                _ = ticker.tick() => self.log("Metrics snapshot"),
                _ = shutdown.changed() => break,
            }
        }

        while let Ok(signal) = self.signals.try_recv() {
            self.stats.on_signal(&signal);
        }
        while let Ok(report) = self.executions.try_recv() {
            self.stats.on_report(&report);
        }

        self.log("Final metrics");
        self.stats
    }

    fn log(&self, message: &'static str) {
        let stats = &self.stats;
        info!(
            signals = stats.signals,
            executions = stats.executions,
            successful = stats.successful_trades,
            failed = stats.failed_trades,
            success_rate_pct = %stats.success_rate_pct().round_dp(1),
            pnl = %stats.total_pnl,
            volume = %stats.total_volume,
            "{}",
            message
        );
    }
}
