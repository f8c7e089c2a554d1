//! Typed event bus.
//!
//! Subscriptions are registered while the process is wired together, before
//! the bus is shared. Publishing is synchronous and never blocks: the event
//! is cloned into each subscriber's unbounded queue in registration order.

use tokio::sync::mpsc;
use tracing::trace;

use crate::domain::{ExecutionReport, ExecutionSignal, OrderBookSnapshot};

/// A single named channel with any number of subscribers.
pub struct Topic<T> {
    name: &'static str,
    subscribers: Vec<mpsc::UnboundedSender<T>>,
}

impl<T: Clone> Topic<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            subscribers: Vec::new(),
        }
    }

    /// Registers a new subscriber and returns its receiving end.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Delivers `event` to every live subscriber and returns how many
    /// received it. Subscribers whose receiver was dropped are skipped.
    pub fn publish(&self, event: T) -> usize {
        let mut delivered = 0;
        for tx in &self.subscribers {
            if tx.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }
        trace!(topic = self.name, delivered, "event published");
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// EventBus carries the three pipeline channels.
pub struct EventBus {
    order_book: Topic<OrderBookSnapshot>,
    signal: Topic<ExecutionSignal>,
    execution: Topic<ExecutionReport>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            order_book: Topic::new("orderBook"),
            signal: Topic::new("signal"),
            execution: Topic::new("execution"),
        }
    }

    pub fn subscribe_order_books(&mut self) -> mpsc::UnboundedReceiver<OrderBookSnapshot> {
        self.order_book.subscribe()
    }

    pub fn subscribe_signals(&mut self) -> mpsc::UnboundedReceiver<ExecutionSignal> {
        self.signal.subscribe()
    }

    pub fn subscribe_executions(&mut self) -> mpsc::UnboundedReceiver<ExecutionReport> {
        self.execution.subscribe()
    }

    pub fn publish_order_book(&self, snapshot: OrderBookSnapshot) -> usize {
        self.order_book.publish(snapshot)
    }

    pub fn publish_signal(&self, signal: ExecutionSignal) -> usize {
        self.signal.publish(signal)
    }

    pub fn publish_execution(&self, report: ExecutionReport) -> usize {
        self.execution.publish(report)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let topic: Topic<u32> = Topic::new("numbers");
        assert_eq!(topic.publish(1), 0);
        assert_eq!(topic.subscriber_count(), 0);
    }

    #[test]
    fn test_every_subscriber_receives_in_order() {
        let mut topic = Topic::new("numbers");
        let mut first = topic.subscribe();
        let mut second = topic.subscribe();

        for n in 0..3u32 {
            assert_eq!(topic.publish(n), 2);
        }

        for rx in [&mut first, &mut second] {
            assert_eq!(rx.try_recv().unwrap(), 0);
            assert_eq!(rx.try_recv().unwrap(), 1);
            assert_eq!(rx.try_recv().unwrap(), 2);
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn test_dropped_subscriber_is_skipped() {
        let mut topic = Topic::new("numbers");
        let dropped = topic.subscribe();
        let mut live = topic.subscribe();
        drop(dropped);

        assert_eq!(topic.publish(7u32), 1);
        assert_eq!(live.try_recv().unwrap(), 7);
    }

    #[test]
    fn test_bus_channels_are_independent() {
        let mut bus = EventBus::new();
        let mut reports = bus.subscribe_executions();
        let mut signals = bus.subscribe_signals();

        bus.publish_execution(ExecutionReport::failed("opp", "signal expired"));

        assert_eq!(reports.try_recv().unwrap().opportunity_id, "opp");
        assert!(signals.try_recv().is_err());
    }
}
