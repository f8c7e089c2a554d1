//! Latest-snapshot cache keyed by venue and instrument.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::OrderBookSnapshot;
use crate::events::EventBus;

/// Notification that a fresh snapshot was cached for `instrument`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotArrived {
    pub venue: String,
    pub instrument: String,
}

/// OrderBookRouter owns the most recent snapshot per (venue, instrument).
///
/// It performs no staleness check; freshness is the reader's policy.
pub struct OrderBookRouter {
    books: HashMap<String, HashMap<String, OrderBookSnapshot>>,
    bus: Arc<EventBus>,
}

impl OrderBookRouter {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            books: HashMap::new(),
            bus,
        }
    }

    /// Stores `snapshot`, replacing any previous one for the same key,
    /// republishes it on the `orderBook` channel and returns the arrival
    /// notice for downstream consumers.
    pub fn publish(&mut self, snapshot: OrderBookSnapshot) -> SnapshotArrived {
        let arrived = SnapshotArrived {
            venue: snapshot.venue.clone(),
            instrument: snapshot.instrument.clone(),
        };

        self.books
            .entry(snapshot.venue.clone())
            .or_default()
            .insert(snapshot.instrument.clone(), snapshot.clone());

        self.bus.publish_order_book(snapshot);

        arrived
    }

    /// Returns the latest snapshot for the key, if any.
    pub fn get_snapshot(&self, venue: &str, instrument: &str) -> Option<&OrderBookSnapshot> {
        self.books.get(venue)?.get(instrument)
    }

    /// Number of cached (venue, instrument) books.
    pub fn len(&self) -> usize {
        self.books.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
