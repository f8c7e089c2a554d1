//! Execution engine.
//!
//! Runs as one task that owns the breaker, the dry-run ledger and the random
//! source. Live leg pairs are awaited inside the same task through a
//! `FuturesUnordered` set, so a slow venue only delays its own signal.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use futures_util::stream::FuturesUnordered;
use futures_util::{FutureExt, StreamExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::{BalanceLedger, CircuitBreaker, ExecutionError};
use crate::config::{Config, DryRunConfig};
use crate::domain::pricing::bps_to_decimal;
use crate::domain::{
    ExecutionReport, ExecutionSignal, Opportunity, OrderRequest, OrderResult, OrderSide,
};
use crate::events::EventBus;
use crate::exchanges::{ConnectorRegistry, ExchangeError, VenueConnector};
use crate::storage::TradeStore;

/// Dry-run state: the ledger plus the seeded source for extra slippage and
/// injected failures.
pub struct Simulation {
    ledger: BalanceLedger,
    rng: StdRng,
    max_slippage_bps: Decimal,
    failure_chance_pct: Decimal,
}

impl Simulation {
    pub fn new(ledger: BalanceLedger, config: &DryRunConfig, rng: StdRng) -> Self {
        Self {
            ledger,
            rng,
            max_slippage_bps: config.max_slippage_bps,
            failure_chance_pct: config.failure_chance_pct,
        }
    }

    /// Extra slippage in basis points, uniform in `[0, max_slippage_bps]`.
    fn draw_slippage_bps(&mut self) -> Decimal {
        let max = self.max_slippage_bps.to_f64().unwrap_or(0.0);
        if max <= 0.0 {
            return Decimal::ZERO;
        }
        Decimal::from_f64(self.rng.gen_range(0.0..=max)).unwrap_or_default()
    }

    fn draw_failure(&mut self) -> bool {
        let chance = self.failure_chance_pct.to_f64().unwrap_or(0.0);
        self.rng.gen_range(0.0..100.0) < chance
    }

    /// Fills both legs against the ledger and returns the PnL. Nothing is
    /// mutated unless the trade goes through.
    fn execute(
        &mut self,
        opportunity: &Opportunity,
        buy_order: &OrderRequest,
        sell_order: &OrderRequest,
    ) -> Result<Decimal, ExecutionError> {
        let extra = bps_to_decimal(self.draw_slippage_bps());
        let buy_price = buy_order.price * (Decimal::ONE + extra);
        let sell_price = sell_order.price * (Decimal::ONE - extra);
        let buy_notional = buy_price * buy_order.quantity;
        let sell_notional = sell_price * sell_order.quantity;

        if !self.ledger.can_debit(&opportunity.buy_venue, buy_notional) {
            return Err(ExecutionError::InsufficientBalance {
                venue: opportunity.buy_venue.clone(),
                required: buy_notional,
                available: self.ledger.balance_of(&opportunity.buy_venue),
            });
        }

        if self.draw_failure() {
            return Err(ExecutionError::SimulatedFailure);
        }

        let pnl = sell_notional - buy_notional;
        self.ledger.apply_trade(
            &opportunity.buy_venue,
            &opportunity.sell_venue,
            buy_notional,
            sell_notional,
        );

        info!(
            opportunity_id = %opportunity.id,
            instrument = %opportunity.instrument,
            direction = %opportunity.direction(),
            buy_price = %buy_price.round_dp(4),
            sell_price = %sell_price.round_dp(4),
            pnl = %pnl.round_dp(2),
            "Dry run execution"
        );

        Ok(pnl)
    }
}

/// Both legs of a live execution, once settled.
struct LiveOutcome {
    signal: ExecutionSignal,
    buy: Result<OrderResult, ExchangeError>,
    sell: Result<OrderResult, ExchangeError>,
}

/// What handling a signal produced right away.
enum Dispatch {
    /// Finished; the report, unless the signal was dropped.
    Done(Option<ExecutionReport>),
    /// Live legs in flight.
    Pending(BoxFuture<'static, LiveOutcome>),
}

/// ExecutionEngine turns signals into trades and reports.
pub struct ExecutionEngine {
    connectors: Arc<ConnectorRegistry>,
    bus: Arc<EventBus>,
    store: Arc<dyn TradeStore>,
    breaker: CircuitBreaker,
    simulation: Option<Simulation>,
}

impl ExecutionEngine {
    pub fn new(
        connectors: Arc<ConnectorRegistry>,
        bus: Arc<EventBus>,
        store: Arc<dyn TradeStore>,
        breaker: CircuitBreaker,
        simulation: Option<Simulation>,
    ) -> Self {
        Self {
            connectors,
            bus,
            store,
            breaker,
            simulation,
        }
    }

    /// Builds the engine from configuration. Dry-run mode seeds a ledger for
    /// every registered venue.
    pub fn from_config(
        config: &Config,
        connectors: Arc<ConnectorRegistry>,
        bus: Arc<EventBus>,
        store: Arc<dyn TradeStore>,
    ) -> Self {
        let simulation = config.dry_run.enabled.then(|| {
            let ledger = BalanceLedger::new(connectors.list(), config.dry_run.start_balance);
            let rng = match config.dry_run.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            Simulation::new(ledger, &config.dry_run, rng)
        });

        Self::new(
            connectors,
            bus,
            store,
            CircuitBreaker::from_config(&config.execution),
            simulation,
        )
    }

    pub fn is_dry_run(&self) -> bool {
        self.simulation.is_some()
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Dry-run ledger, if simulating.
    pub fn ledger(&self) -> Option<&BalanceLedger> {
        self.simulation.as_ref().map(|s| &s.ledger)
    }

    /// Consumes signals until the channel closes or `shutdown` fires, then
    /// waits for every in-flight execution to settle.
    pub async fn run(
        mut self,
        mut signals: mpsc::UnboundedReceiver<ExecutionSignal>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut in_flight: FuturesUnordered<BoxFuture<'static, LiveOutcome>> = FuturesUnordered::new();
        let mut accepting = true;

        info!(dry_run = self.is_dry_run(), "Execution engine started");

        loop {
            tokio::select! {
                biased;

                signal = signals.recv(), if accepting => match signal {
                    Some(signal) => {
                        if let Dispatch::Pending(legs) = self.dispatch(signal, Utc::now()).await {
                            in_flight.push(legs);
                        }
                    }
                    None => accepting = false,
                },
                _ = shutdown.changed(), if accepting => {
                    debug!(in_flight = in_flight.len(), "Execution engine draining");
                    accepting = false;
                }
                Some(outcome) = in_flight.next(), if !in_flight.is_empty() => {
                    self.settle(outcome, Utc::now()).await;
                }
                else => break,
            }
        }

        match self.ledger() {
            Some(ledger) => info!(balances = ?ledger.snapshot(), "Execution engine stopped"),
            None => info!("Execution engine stopped"),
        }
    }

    /// Handles one signal to completion at `now`, awaiting live legs inline.
    /// Returns the published report, or None if the breaker dropped it.
    pub async fn process_at(
        &mut self,
        signal: ExecutionSignal,
        now: DateTime<Utc>,
    ) -> Option<ExecutionReport> {
        match self.dispatch(signal, now).await {
            Dispatch::Done(report) => report,
            Dispatch::Pending(legs) => {
                let outcome = legs.await;
                Some(self.settle(outcome, now).await)
            }
        }
    }

    async fn dispatch(&mut self, signal: ExecutionSignal, now: DateTime<Utc>) -> Dispatch {
        let opportunity_id = signal.opportunity.id.clone();

        if self.breaker.is_open_at(now) {
            warn!(
                opportunity_id = %opportunity_id,
                paused_until = ?self.breaker.paused_until(),
                "Execution paused, skipping signal"
            );
            return Dispatch::Done(None);
        }

        match self.start(signal, now).await {
            Ok(dispatch) => dispatch,
            Err(e) => Dispatch::Done(Some(self.fail(&opportunity_id, e, now))),
        }
    }

    async fn start(
        &mut self,
        signal: ExecutionSignal,
        now: DateTime<Utc>,
    ) -> Result<Dispatch, ExecutionError> {
        let opportunity = &signal.opportunity;

        if opportunity.is_expired_at(now) {
            return Err(ExecutionError::Expired);
        }

        let buy_connector = self.connector(&opportunity.buy_venue)?;
        let sell_connector = self.connector(&opportunity.sell_venue)?;

        let (buy_order, sell_order) = leg_orders(opportunity, signal.max_slippage_bps);

        if let Some(simulation) = self.simulation.as_mut() {
            let pnl = simulation.execute(opportunity, &buy_order, &sell_order)?;
            self.record(opportunity, pnl).await;

            let report = ExecutionReport::filled(
                opportunity.id.clone(),
                opportunity.quantity,
                pnl,
                Some("dry run".to_string()),
            );
            self.bus.publish_execution(report.clone());
            return Ok(Dispatch::Done(Some(report)));
        }

        debug!(
            opportunity_id = %opportunity.id,
            buy = ?buy_order,
            sell = ?sell_order,
            "Submitting legs"
        );

        let legs = async move {
            let (buy, sell) = tokio::join!(
                buy_connector.place_order(buy_order),
                sell_connector.place_order(sell_order)
            );
            LiveOutcome { signal, buy, sell }
        };

        Ok(Dispatch::Pending(legs.boxed()))
    }

    fn connector(&self, venue: &str) -> Result<Arc<dyn VenueConnector>, ExecutionError> {
        self.connectors
            .get(venue)
            .ok_or_else(|| ExecutionError::MissingConnector(venue.to_string()))
    }

    /// Judges both live legs and publishes the report.
    async fn settle(&mut self, outcome: LiveOutcome, now: DateTime<Utc>) -> ExecutionReport {
        let opportunity = &outcome.signal.opportunity;

        let (buy, sell) = match (outcome.buy, outcome.sell) {
            (Ok(buy), Ok(sell)) => (buy, sell),
            (Err(e), _) | (_, Err(e)) => return self.fail(&opportunity.id, e.into(), now),
        };

        if !buy.is_filled() || !sell.is_filled() {
            let error = ExecutionError::LegsNotFilled {
                buy: buy.status,
                sell: sell.status,
            };
            return self.fail(&opportunity.id, error, now);
        }

        let pnl = (sell.avg_price - buy.avg_price) * sell.filled_qty;

        self.record(opportunity, pnl).await;
        self.breaker.record_success();

        info!(
            opportunity_id = %opportunity.id,
            instrument = %opportunity.instrument,
            direction = %opportunity.direction(),
            filled = %sell.filled_qty,
            pnl = %pnl.round_dp(2),
            "Executed arbitrage trade"
        );

        let report = ExecutionReport::filled(opportunity.id.clone(), sell.filled_qty, pnl, None);
        self.bus.publish_execution(report.clone());
        report
    }

    async fn record(&self, opportunity: &Opportunity, pnl: Decimal) {
        if let Err(e) = self.store.record(opportunity, pnl).await {
            warn!(opportunity_id = %opportunity.id, error = %e, "Failed to record trade");
        }
    }

    /// Turns an error into a failure report, counting it if it is a fault.
    fn fail(&mut self, opportunity_id: &str, error: ExecutionError, now: DateTime<Utc>) -> ExecutionReport {
        if error.counts_toward_breaker() {
            if self.breaker.record_failure_at(now) {
                warn!(paused_until = ?self.breaker.paused_until(), "Circuit breaker triggered");
            }
            error!(opportunity_id = %opportunity_id, error = %error, "Execution failure");
        } else {
            debug!(opportunity_id = %opportunity_id, reason = %error, "Signal rejected");
        }

        let report = ExecutionReport::failed(opportunity_id, error.to_string());
        self.bus.publish_execution(report.clone());
        report
    }
}

/// Limit orders for both legs, widened by `slippage_bps` against us.
fn leg_orders(opportunity: &Opportunity, slippage_bps: Decimal) -> (OrderRequest, OrderRequest) {
    let slippage = bps_to_decimal(slippage_bps);

    let buy = OrderRequest::limit(
        opportunity.instrument.clone(),
        OrderSide::Buy,
        opportunity.quantity,
        opportunity.buy_price * (Decimal::ONE + slippage),
    );
    let sell = OrderRequest::limit(
        opportunity.instrument.clone(),
        OrderSide::Sell,
        opportunity.quantity,
        opportunity.sell_price * (Decimal::ONE - slippage),
    );

    (buy, sell)
}

#[cfg(test)]
mod tests;
