//! Market data caching and routing.

pub mod replay;
mod router;

pub use router::OrderBookRouter;
