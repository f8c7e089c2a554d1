//! Execution error types.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::OrderStatus;
use crate::exchanges::ExchangeError;

/// Why a signal did not turn into a trade.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("signal expired")]
    Expired,

    #[error("insufficient balance")]
    InsufficientBalance {
        venue: String,
        required: Decimal,
        available: Decimal,
    },

    #[error("simulated failure")]
    SimulatedFailure,

    #[error("missing exchange connector: {0}")]
    MissingConnector(String),

    #[error("orders not fully filled (buy {buy}, sell {sell})")]
    LegsNotFilled { buy: OrderStatus, sell: OrderStatus },

    #[error(transparent)]
    Connector(#[from] ExchangeError),
}

impl ExecutionError {
    /// Returns true for execution faults. Timing misses, risk checks and
    /// injected simulation failures do not trip the circuit breaker.
    pub fn counts_toward_breaker(&self) -> bool {
        matches!(
            self,
            ExecutionError::MissingConnector(_)
                | ExecutionError::LegsNotFilled { .. }
                | ExecutionError::Connector(_)
        )
    }
}
