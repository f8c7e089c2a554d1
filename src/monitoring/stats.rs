//! Runtime statistics for the pipeline.

use rust_decimal::Decimal;

use crate::domain::{ExecutionReport, ExecutionSignal};

/// Runtime statistics for the pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stats {
    pub signals: u64,
    pub executions: u64,
    pub successful_trades: u64,
    pub failed_trades: u64,
    pub total_pnl: Decimal,
    pub total_volume: Decimal,
    pub best_trade: Option<Decimal>,
    pub worst_trade: Option<Decimal>,
}

impl Stats {
    pub fn on_signal(&mut self, _signal: &ExecutionSignal) {
        self.signals += 1;
    }

    /// Counts a report. Only successful trades contribute PnL and volume.
    pub fn on_report(&mut self, report: &ExecutionReport) {
        self.executions += 1;

        if !report.success {
            self.failed_trades += 1;
            return;
        }

        self.successful_trades += 1;
        self.total_volume += report.filled_size.unwrap_or_default();

        if let Some(pnl) = report.pnl {
            self.total_pnl += pnl;
            self.best_trade = Some(self.best_trade.map_or(pnl, |b| b.max(pnl)));
            self.worst_trade = Some(self.worst_trade.map_or(pnl, |w| w.min(pnl)));
        }
    }

    /// Share of executions that succeeded, in percent.
    pub fn success_rate_pct(&self) -> Decimal {
        if self.executions == 0 {
            return Decimal::ZERO;
        }
        Decimal::from(self.successful_trades) * Decimal::ONE_HUNDRED / Decimal::from(self.executions)
    }
}
