use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::{mpsc, watch};

use super::*;
use crate::config::DryRunConfig;
use crate::domain::{OrderStatus, Opportunity};
use crate::exchanges::{self, VenueEventSender};
use crate::storage::MemoryTradeStore;

/// Mock venue answering every order with a fixed status at the limit price.
struct MockVenue {
    name: String,
    status: OrderStatus,
    fail: bool,
    hang: bool,
    orders: AtomicUsize,
}

impl MockVenue {
    fn filling(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: OrderStatus::Filled,
            fail: false,
            hang: false,
            orders: AtomicUsize::new(0),
        }
    }

    fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = status;
        self
    }

    fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }
}

#[async_trait]
impl VenueConnector for MockVenue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, _instruments: Vec<String>, _events: VenueEventSender) -> exchanges::Result<()> {
        Ok(())
    }

    async fn stop(&self) -> exchanges::Result<()> {
        Ok(())
    }

    async fn place_order(&self, request: OrderRequest) -> exchanges::Result<OrderResult> {
        self.orders.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        if self.fail {
            return Err(ExchangeError::Api("venue unavailable".into()));
        }
        Ok(OrderResult {
            order_id: format!("{}-1", self.name),
            filled_qty: request.quantity,
            avg_price: request.price,
            status: self.status,
            completed_at: Utc::now(),
        })
    }
}

struct Harness {
    engine: ExecutionEngine,
    store: Arc<MemoryTradeStore>,
    reports: mpsc::UnboundedReceiver<ExecutionReport>,
}

fn registry(venues: Vec<Arc<MockVenue>>) -> Arc<ConnectorRegistry> {
    let mut registry = ConnectorRegistry::new();
    for venue in venues {
        registry.register(venue);
    }
    Arc::new(registry)
}

fn harness(connectors: Arc<ConnectorRegistry>, simulation: Option<Simulation>) -> Harness {
    let mut bus = EventBus::new();
    let reports = bus.subscribe_executions();
    let store = Arc::new(MemoryTradeStore::new());

    let engine = ExecutionEngine::new(
        connectors,
        Arc::new(bus),
        store.clone(),
        CircuitBreaker::default(),
        simulation,
    );

    Harness {
        engine,
        store,
        reports,
    }
}

fn live_harness() -> Harness {
    harness(
        registry(vec![
            Arc::new(MockVenue::filling("alpha")),
            Arc::new(MockVenue::filling("beta")),
        ]),
        None,
    )
}

fn simulation(start_balance: Decimal, max_slippage_bps: Decimal, failure_chance_pct: Decimal) -> Simulation {
    let config = DryRunConfig {
        enabled: true,
        start_balance,
        max_slippage_bps,
        failure_chance_pct,
        seed: Some(7),
    };
    Simulation::new(
        BalanceLedger::new(["alpha", "beta"], start_balance),
        &config,
        StdRng::seed_from_u64(7),
    )
}

fn dry_run_harness(simulation: Simulation) -> Harness {
    harness(
        registry(vec![
            Arc::new(MockVenue::filling("alpha")),
            Arc::new(MockVenue::filling("beta")),
        ]),
        Some(simulation),
    )
}

fn signal(id: &str, buy_venue: &str, expires_at: DateTime<Utc>) -> ExecutionSignal {
    ExecutionSignal {
        opportunity: Opportunity {
            id: id.to_string(),
            instrument: "BTCUSDT".to_string(),
            buy_venue: buy_venue.to_string(),
            sell_venue: "beta".to_string(),
            quantity: dec!(1),
            buy_price: dec!(100),
            sell_price: dec!(100.5),
            gross_spread_bps: dec!(40.75),
            net_spread_bps: dec!(30.75),
            detected_at: expires_at - Duration::seconds(2),
            expires_at,
        },
        max_slippage_bps: dec!(5),
        created_at: expires_at - Duration::seconds(2),
    }
}

#[test]
fn test_leg_orders_widen_against_us() {
    let now = Utc::now();
    let (buy, sell) = leg_orders(&signal("s", "alpha", now).opportunity, dec!(5));

    assert_eq!(buy.side, OrderSide::Buy);
    assert_eq!(buy.price, dec!(100.05));
    assert_eq!(sell.side, OrderSide::Sell);
    assert_eq!(sell.price, dec!(100.44975));
    assert_eq!(buy.quantity, dec!(1));
    assert_eq!(sell.quantity, dec!(1));
}

#[tokio::test]
async fn test_live_success_reports_fill_and_pnl() {
    let mut h = live_harness();
    let now = Utc::now();

    let report = h
        .engine
        .process_at(signal("s-1", "alpha", now + Duration::seconds(2)), now)
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(report.opportunity_id, "s-1");
    assert_eq!(report.filled_size, Some(dec!(1)));
    assert_eq!(report.pnl, Some(dec!(0.39975)));

    let published = h.reports.try_recv().unwrap();
    assert_eq!(published, report);
    assert_eq!(h.store.count().await.unwrap(), 1);
    assert_eq!(h.store.total_pnl().await.unwrap(), dec!(0.39975));
}

#[tokio::test]
async fn test_expired_signal_is_not_counted() {
    let mut h = live_harness();
    let now = Utc::now();

    let report = h
        .engine
        .process_at(signal("s-1", "alpha", now - Duration::milliseconds(1)), now)
        .await
        .unwrap();

    assert!(!report.success);
    assert_eq!(report.message.as_deref(), Some("signal expired"));
    assert_eq!(h.engine.breaker().consecutive_failures(), 0);
    assert_eq!(h.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_missing_connector_is_counted() {
    let mut h = live_harness();
    let now = Utc::now();

    let report = h
        .engine
        .process_at(signal("s-1", "gamma", now + Duration::seconds(2)), now)
        .await
        .unwrap();

    assert!(!report.success);
    assert_eq!(report.message.as_deref(), Some("missing exchange connector: gamma"));
    assert_eq!(h.engine.breaker().consecutive_failures(), 1);
}

#[tokio::test]
async fn test_breaker_trips_drops_and_recovers() {
    let mut h = live_harness();
    let start = Utc::now();

    for n in 0..3 {
        let report = h
            .engine
            .process_at(signal(&format!("bad-{}", n), "gamma", start + Duration::seconds(2)), start)
            .await
            .unwrap();
        assert!(!report.success);
    }
    assert_eq!(h.engine.breaker().paused_until(), Some(start + Duration::seconds(5)));
    assert_eq!(h.engine.breaker().consecutive_failures(), 0);

    for _ in 0..3 {
        h.reports.try_recv().unwrap();
    }

    let during = start + Duration::seconds(1);
    let dropped = h
        .engine
        .process_at(signal("fourth", "alpha", during + Duration::seconds(2)), during)
        .await;
    assert!(dropped.is_none());
    assert!(h.reports.try_recv().is_err());

    let after = start + Duration::seconds(5);
    let report = h
        .engine
        .process_at(signal("fifth", "alpha", after + Duration::seconds(2)), after)
        .await
        .unwrap();
    assert!(report.success);
    assert!(!h.engine.breaker().is_open_at(after));
    assert_eq!(h.engine.breaker().consecutive_failures(), 0);
}

#[tokio::test]
async fn test_live_unfilled_leg_is_counted() {
    let connectors = registry(vec![
        Arc::new(MockVenue::filling("alpha")),
        Arc::new(MockVenue::filling("beta").with_status(OrderStatus::Rejected)),
    ]);
    let mut h = harness(connectors, None);
    let now = Utc::now();

    let report = h
        .engine
        .process_at(signal("s-1", "alpha", now + Duration::seconds(2)), now)
        .await
        .unwrap();

    assert!(!report.success);
    assert_eq!(
        report.message.as_deref(),
        Some("orders not fully filled (buy filled, sell rejected)")
    );
    assert_eq!(h.engine.breaker().consecutive_failures(), 1);
    assert_eq!(h.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_live_connector_error_is_counted() {
    let beta = Arc::new(MockVenue::filling("beta").failing());
    let alpha = Arc::new(MockVenue::filling("alpha"));
    let mut h = harness(registry(vec![alpha.clone(), beta.clone()]), None);
    let now = Utc::now();

    let report = h
        .engine
        .process_at(signal("s-1", "alpha", now + Duration::seconds(2)), now)
        .await
        .unwrap();

    assert!(!report.success);
    assert_eq!(report.message.as_deref(), Some("API error: venue unavailable"));
    assert_eq!(h.engine.breaker().consecutive_failures(), 1);
    assert_eq!(alpha.orders.load(Ordering::SeqCst), 1);
    assert_eq!(beta.orders.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_live_success_resets_counter() {
    let mut h = live_harness();
    let now = Utc::now();

    h.engine
        .process_at(signal("bad", "gamma", now + Duration::seconds(2)), now)
        .await;
    assert_eq!(h.engine.breaker().consecutive_failures(), 1);

    h.engine
        .process_at(signal("good", "alpha", now + Duration::seconds(2)), now)
        .await;
    assert_eq!(h.engine.breaker().consecutive_failures(), 0);
}

#[tokio::test]
async fn test_dry_run_success_updates_ledger() {
    let mut h = dry_run_harness(simulation(dec!(2000), Decimal::ZERO, Decimal::ZERO));
    let now = Utc::now();

    let report = h
        .engine
        .process_at(signal("s-1", "alpha", now + Duration::seconds(2)), now)
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(report.message.as_deref(), Some("dry run"));
    assert_eq!(report.filled_size, Some(dec!(1)));
    assert_eq!(report.pnl, Some(dec!(0.39975)));

    let ledger = h.engine.ledger().unwrap();
    assert_eq!(ledger.balance_of("alpha"), dec!(1899.95));
    assert_eq!(ledger.balance_of("beta"), dec!(2100.44975));
    assert_eq!(h.store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_dry_run_success_does_not_reset_counter() {
    let mut h = dry_run_harness(simulation(dec!(2000), Decimal::ZERO, Decimal::ZERO));
    let now = Utc::now();

    h.engine
        .process_at(signal("bad", "gamma", now + Duration::seconds(2)), now)
        .await;
    h.engine
        .process_at(signal("good", "alpha", now + Duration::seconds(2)), now)
        .await;

    assert_eq!(h.engine.breaker().consecutive_failures(), 1);
}

#[tokio::test]
async fn test_dry_run_extra_slippage_worsens_pnl() {
    let mut h = dry_run_harness(simulation(dec!(2000), dec!(10), Decimal::ZERO));
    let now = Utc::now();

    let report = h
        .engine
        .process_at(signal("s-1", "alpha", now + Duration::seconds(2)), now)
        .await
        .unwrap();

    let pnl = report.pnl.unwrap();
    assert!(pnl <= dec!(0.39975));
    // 10 bps on both legs of ~100 costs at most ~0.2.
    assert!(pnl >= dec!(0.19));
}

#[tokio::test]
async fn test_dry_run_insufficient_balance() {
    let mut h = dry_run_harness(simulation(dec!(50), Decimal::ZERO, Decimal::ZERO));
    let now = Utc::now();

    let report = h
        .engine
        .process_at(signal("s-1", "alpha", now + Duration::seconds(2)), now)
        .await
        .unwrap();

    assert!(!report.success);
    assert_eq!(report.message.as_deref(), Some("insufficient balance"));
    assert_eq!(h.engine.breaker().consecutive_failures(), 0);

    let ledger = h.engine.ledger().unwrap();
    assert_eq!(ledger.balance_of("alpha"), dec!(50));
    assert_eq!(ledger.balance_of("beta"), dec!(50));
    assert_eq!(h.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_dry_run_injected_failure() {
    let mut h = dry_run_harness(simulation(dec!(2000), Decimal::ZERO, dec!(100)));
    let now = Utc::now();

    let report = h
        .engine
        .process_at(signal("s-1", "alpha", now + Duration::seconds(2)), now)
        .await
        .unwrap();

    assert!(!report.success);
    assert_eq!(report.message.as_deref(), Some("simulated failure"));
    assert_eq!(h.engine.breaker().consecutive_failures(), 0);
    assert_eq!(h.engine.ledger().unwrap().balance_of("alpha"), dec!(2000));
}

#[tokio::test]
async fn test_dry_run_same_seed_same_outcome() {
    let now = Utc::now();
    let mut pnls = Vec::new();

    for _ in 0..2 {
        let mut h = dry_run_harness(simulation(dec!(2000), dec!(10), dec!(50)));
        let mut outcomes = Vec::new();
        for n in 0..5 {
            let report = h
                .engine
                .process_at(signal(&format!("s-{}", n), "alpha", now + Duration::seconds(2)), now)
                .await
                .unwrap();
            outcomes.push((report.success, report.pnl));
        }
        pnls.push(outcomes);
    }

    assert_eq!(pnls[0], pnls[1]);
}

#[tokio::test]
async fn test_run_loop_reports_every_signal() {
    let h = live_harness();
    let mut reports = h.reports;
    let (tx, rx) = mpsc::unbounded_channel();
    let (_stop, shutdown) = watch::channel(false);
    let handle = tokio::spawn(h.engine.run(rx, shutdown));

    let expires_at = Utc::now() + Duration::seconds(30);
    for n in 0..3 {
        tx.send(signal(&format!("s-{}", n), "alpha", expires_at)).unwrap();
    }
    drop(tx);

    handle.await.unwrap();

    let mut ids = Vec::new();
    while let Ok(report) = reports.try_recv() {
        assert!(report.success);
        ids.push(report.opportunity_id);
    }
    ids.sort();
    assert_eq!(ids, vec!["s-0", "s-1", "s-2"]);
}

#[tokio::test]
async fn test_run_loop_stops_on_shutdown() {
    let h = live_harness();
    let mut reports = h.reports;
    let (tx, rx) = mpsc::unbounded_channel();
    let (stop, shutdown) = watch::channel(false);
    let handle = tokio::spawn(h.engine.run(rx, shutdown));

    tx.send(signal("before", "alpha", Utc::now() + Duration::seconds(30)))
        .unwrap();
    let report = reports.recv().await.unwrap();
    assert_eq!(report.opportunity_id, "before");

    stop.send(true).unwrap();
    handle.await.unwrap();

    // The sender is still alive; the engine returned because of shutdown.
    assert!(tx.is_closed());
}

#[tokio::test]
async fn test_run_loop_hung_venue_stalls_only_its_signal() {
    let stuck = Arc::new(MockVenue::filling("stuck").hanging());
    let h = harness(
        registry(vec![
            stuck.clone(),
            Arc::new(MockVenue::filling("alpha")),
            Arc::new(MockVenue::filling("beta")),
        ]),
        None,
    );
    let mut reports = h.reports;
    let (tx, rx) = mpsc::unbounded_channel();
    let (_stop, shutdown) = watch::channel(false);
    let handle = tokio::spawn(h.engine.run(rx, shutdown));

    let expires_at = Utc::now() + Duration::seconds(30);
    tx.send(signal("hung", "stuck", expires_at)).unwrap();
    tx.send(signal("free", "alpha", expires_at)).unwrap();

    let report = tokio::time::timeout(std::time::Duration::from_secs(1), reports.recv())
        .await
        .expect("second signal was blocked by the hung venue")
        .unwrap();
    assert_eq!(report.opportunity_id, "free");
    assert!(report.success);
    assert_eq!(stuck.orders.load(Ordering::SeqCst), 1);
    assert!(reports.try_recv().is_err());

    handle.abort();
}
