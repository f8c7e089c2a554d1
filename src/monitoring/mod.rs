//! Runtime metrics and trade log reporting.
//!
//! The collector listens on the signal and execution topics and logs a
//! snapshot of the counters at a fixed interval.

mod collector;
mod report;
mod stats;

pub use collector::StatsCollector;
pub use report::TradeReport;
pub use stats::Stats;
