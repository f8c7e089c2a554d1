//! In-process publish/subscribe backbone.

mod bus;

pub use bus::EventBus;
