//! Market data pipeline.
//!
//! One task owns the router and the detector, so snapshots are cached and
//! evaluated strictly in arrival order.

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::domain::{ExecutionReport, ExecutionSignal};
use crate::exchanges::VenueEvent;
use crate::market::OrderBookRouter;
use crate::strategy::OpportunityDetector;

pub struct Pipeline {
    router: OrderBookRouter,
    detector: OpportunityDetector,
    events: mpsc::UnboundedReceiver<VenueEvent>,
    reports: mpsc::UnboundedReceiver<ExecutionReport>,
    snapshots: u64,
}

impl Pipeline {
    pub fn new(
        router: OrderBookRouter,
        detector: OpportunityDetector,
        events: mpsc::UnboundedReceiver<VenueEvent>,
        reports: mpsc::UnboundedReceiver<ExecutionReport>,
    ) -> Self {
        Self {
            router,
            detector,
            events,
            reports,
            snapshots: 0,
        }
    }

    /// Routes one venue event. Returns the signals a snapshot produced.
    pub fn handle_event(&mut self, event: VenueEvent) -> Vec<ExecutionSignal> {
        match event {
            VenueEvent::OrderBook(snapshot) => {
                self.snapshots += 1;
                let arrived = self.router.publish(snapshot);
                self.detector.on_snapshot(&self.router, &arrived.instrument)
            }
            VenueEvent::Balance(balance) => {
                debug!(
                    venue = %balance.venue,
                    asset = %balance.asset,
                    free = %balance.free,
                    locked = %balance.locked,
                    "Balance update"
                );
                Vec::new()
            }
            VenueEvent::Error { venue, message } => {
                warn!(venue = %venue, error = %message, "Venue feed error");
                Vec::new()
            }
        }
    }

    pub fn handle_report(&mut self, report: &ExecutionReport) {
        self.detector.on_report(report);
    }

    /// Runs until `shutdown` fires or every event sender is gone. Returns
    /// the number of snapshots processed.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> u64 {
        info!("Market data pipeline started");

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => {
                        self.handle_event(event);
                    }
                    None => {
                        debug!("Venue event channel closed");
                        break;
                    }
                },
                Some(report) = self.reports.recv() => self.handle_report(&report),
                _ = shutdown.changed() => break,
            }
        }

        info!(
            snapshots = self.snapshots,
            cached_books = self.router.len(),
            active_signals = self.detector.active_signals(),
            "Market data pipeline stopped"
        );

        self.snapshots
    }
}
