//! Cross-venue opportunity detection.

mod detector;

pub use detector::{DetectorSettings, OpportunityDetector, VenueProfile};

#[cfg(test)]
mod tests;
