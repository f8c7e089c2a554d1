//! Domain models for cross-venue arbitrage.

mod fees;
mod opportunity;
mod order;
mod orderbook;
pub mod pricing;

pub use fees::Fees;
pub use opportunity::{ExecutionReport, ExecutionSignal, Opportunity};
pub use order::{BalanceSummary, OrderRequest, OrderResult, OrderSide, OrderStatus};
pub use orderbook::{OrderBookSnapshot, PriceLevel};
