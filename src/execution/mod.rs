//! Signal execution: circuit breaker, dry-run ledger and the engine task.

mod breaker;
mod engine;
mod error;
mod ledger;

pub use breaker::CircuitBreaker;
pub use engine::ExecutionEngine;
pub use error::ExecutionError;
pub use ledger::BalanceLedger;
