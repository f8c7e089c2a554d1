use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;

use super::*;
use crate::config::Config;
use crate::domain::pricing::{SpreadInputs, net_spread_bps};
use crate::domain::{ExecutionReport, ExecutionSignal, OrderBookSnapshot, PriceLevel};
use crate::events::EventBus;
use crate::market::OrderBookRouter;

fn venue(name: &str, taker_fee_bps: Decimal) -> VenueProfile {
    VenueProfile {
        name: name.to_string(),
        taker_fee_bps,
        min_notional: dec!(10),
        max_position_notional: dec!(1000000),
    }
}

struct Harness {
    router: OrderBookRouter,
    detector: OpportunityDetector,
    signals: mpsc::UnboundedReceiver<ExecutionSignal>,
}

fn harness_with(alpha: VenueProfile, beta: VenueProfile, settings: DetectorSettings) -> Harness {
    let mut bus = EventBus::new();
    let signals = bus.subscribe_signals();
    let bus = Arc::new(bus);

    Harness {
        router: OrderBookRouter::new(bus.clone()),
        detector: OpportunityDetector::new(alpha, beta, settings, bus),
        signals,
    }
}

fn harness() -> Harness {
    harness_with(venue("alpha", dec!(4)), venue("beta", dec!(5)), DetectorSettings::default())
}

fn book(
    venue: &str,
    instrument: &str,
    bids: &[(Decimal, Decimal)],
    asks: &[(Decimal, Decimal)],
    received_at: DateTime<Utc>,
) -> OrderBookSnapshot {
    let levels = |side: &[(Decimal, Decimal)]| {
        side.iter()
            .map(|(price, size)| PriceLevel::new(*price, *size))
            .collect::<Vec<_>>()
    };
    OrderBookSnapshot::new(venue, instrument, levels(bids), levels(asks), 1, received_at)
}

/// Publishes a profitable alpha->beta setup for `instrument`.
fn publish_dislocation(harness: &mut Harness, instrument: &str, now: DateTime<Utc>) {
    harness.router.publish(book(
        "alpha",
        instrument,
        &[(dec!(99.90), dec!(1.0))],
        &[(dec!(100.00), dec!(1.0))],
        now,
    ));
    harness.router.publish(book(
        "beta",
        instrument,
        &[(dec!(100.50), dec!(1.0))],
        &[(dec!(100.60), dec!(1.0))],
        now,
    ));
}

fn evaluate(harness: &mut Harness, instrument: &str, now: DateTime<Utc>) -> Vec<ExecutionSignal> {
    harness.detector.on_snapshot_at(&harness.router, instrument, now)
}

#[test]
fn test_end_to_end_emits_only_profitable_direction() {
    let mut h = harness();
    let now = Utc::now();
    publish_dislocation(&mut h, "BTCUSDT", now);

    let signals = evaluate(&mut h, "BTCUSDT", now);

    assert_eq!(signals.len(), 1);
    let opportunity = &signals[0].opportunity;
    assert_eq!(opportunity.instrument, "BTCUSDT");
    assert_eq!(opportunity.buy_venue, "alpha");
    assert_eq!(opportunity.sell_venue, "beta");
    assert_eq!(opportunity.quantity, dec!(1.0));
    assert_eq!(opportunity.buy_price, dec!(100.00));
    assert_eq!(opportunity.sell_price, dec!(100.50));

    let expected = net_spread_bps(&SpreadInputs {
        buy_price: dec!(100),
        sell_price: dec!(100.5),
        buy_fee_bps: dec!(4),
        sell_fee_bps: dec!(5),
        slippage_bps: dec!(5),
    });
    assert_eq!(opportunity.net_spread_bps, expected);
    assert!(opportunity.net_spread_bps > dec!(15));
    assert_eq!(opportunity.gross_spread_bps, expected + dec!(10));
    assert_eq!(opportunity.expires_at, now + Duration::seconds(2));
    assert_eq!(signals[0].max_slippage_bps, dec!(5));

    let published = h.signals.try_recv().unwrap();
    assert_eq!(published.opportunity.id, opportunity.id);
    assert!(h.signals.try_recv().is_err());
    assert_eq!(h.detector.active_signals(), 1);
}

#[test]
fn test_thin_spread_is_rejected() {
    let mut h = harness();
    let now = Utc::now();
    h.router.publish(book("alpha", "BTCUSDT", &[(dec!(99.90), dec!(1))], &[(dec!(100.00), dec!(1))], now));
    h.router.publish(book("beta", "BTCUSDT", &[(dec!(100.30), dec!(1))], &[(dec!(100.40), dec!(1))], now));

    assert!(evaluate(&mut h, "BTCUSDT", now).is_empty());
    assert_eq!(h.detector.active_signals(), 0);
}

#[test]
fn test_missing_book_emits_nothing() {
    let mut h = harness();
    let now = Utc::now();
    h.router.publish(book("alpha", "BTCUSDT", &[(dec!(99.90), dec!(1))], &[(dec!(100.00), dec!(1))], now));

    assert!(evaluate(&mut h, "BTCUSDT", now).is_empty());
    assert!(evaluate(&mut h, "ETHUSDT", now).is_empty());
    assert_eq!(h.detector.active_signals(), 0);
}

#[test]
fn test_empty_sides_are_skipped() {
    let mut h = harness();
    let now = Utc::now();
    h.router.publish(book("alpha", "BTCUSDT", &[(dec!(99.90), dec!(1))], &[], now));
    h.router.publish(book("beta", "BTCUSDT", &[], &[(dec!(100.60), dec!(1))], now));

    assert!(evaluate(&mut h, "BTCUSDT", now).is_empty());
}

#[test]
fn test_cooldown_suppresses_repeat_direction() {
    let mut h = harness();
    let now = Utc::now();
    publish_dislocation(&mut h, "BTCUSDT", now);

    let first = evaluate(&mut h, "BTCUSDT", now);
    assert_eq!(first.len(), 1);
    h.detector
        .on_report(&ExecutionReport::failed(first[0].opportunity.id.clone(), "signal expired"));
    assert_eq!(h.detector.active_signals(), 0);

    let within_ttl = now + Duration::milliseconds(1500);
    assert!(evaluate(&mut h, "BTCUSDT", within_ttl).is_empty());

    let after_ttl = now + Duration::seconds(2);
    let second = evaluate(&mut h, "BTCUSDT", after_ttl);
    assert_eq!(second.len(), 1);
    assert_ne!(second[0].opportunity.id, first[0].opportunity.id);
}

#[test]
fn test_concurrency_cap_blocks_until_report() {
    let mut h = harness();
    let now = Utc::now();
    let instruments = ["BTCUSDT", "ETHUSDT", "SOLUSDT", "XRPUSDT"];
    for instrument in instruments {
        publish_dislocation(&mut h, instrument, now);
    }

    let mut emitted = Vec::new();
    for instrument in &instruments[..3] {
        emitted.extend(evaluate(&mut h, instrument, now));
    }
    assert_eq!(emitted.len(), 3);
    assert_eq!(h.detector.active_signals(), 3);

    assert!(evaluate(&mut h, "XRPUSDT", now).is_empty());

    h.detector.on_report(&ExecutionReport::filled(
        emitted[0].opportunity.id.clone(),
        dec!(1),
        dec!(0.5),
        None,
    ));
    assert_eq!(h.detector.active_signals(), 2);

    let fourth = evaluate(&mut h, "XRPUSDT", now);
    assert_eq!(fourth.len(), 1);
    assert_eq!(h.detector.active_signals(), 3);
}

#[test]
fn test_unreported_signals_release_after_twice_the_ttl() {
    let mut h = harness();
    let now = Utc::now();
    let instruments = ["BTCUSDT", "ETHUSDT", "SOLUSDT", "XRPUSDT"];
    for instrument in instruments {
        publish_dislocation(&mut h, instrument, now);
    }
    for instrument in &instruments[..3] {
        evaluate(&mut h, instrument, now);
    }
    assert_eq!(h.detector.active_signals(), 3);

    // Held until expiry plus one TTL.
    assert!(evaluate(&mut h, "XRPUSDT", now + Duration::milliseconds(3999)).is_empty());

    let released = now + Duration::milliseconds(4001);
    assert_eq!(evaluate(&mut h, "XRPUSDT", released).len(), 1);
    assert_eq!(h.detector.active_signals(), 1);
}

#[test]
fn test_unknown_report_is_ignored() {
    let mut h = harness();
    let now = Utc::now();
    publish_dislocation(&mut h, "BTCUSDT", now);
    evaluate(&mut h, "BTCUSDT", now);

    h.detector.on_report(&ExecutionReport::failed("someone-else", "boom"));
    assert_eq!(h.detector.active_signals(), 1);
}

#[test]
fn test_stale_book_is_treated_as_absent() {
    let mut h = harness();
    let received = Utc::now();
    publish_dislocation(&mut h, "BTCUSDT", received);

    let later = received + Duration::seconds(10);
    assert!(evaluate(&mut h, "BTCUSDT", later).is_empty());

    let settings = DetectorSettings {
        max_book_age: None,
        ..DetectorSettings::default()
    };
    let mut h = harness_with(venue("alpha", dec!(4)), venue("beta", dec!(5)), settings);
    publish_dislocation(&mut h, "BTCUSDT", received);
    assert_eq!(evaluate(&mut h, "BTCUSDT", later).len(), 1);
}

#[test]
fn test_quantity_capped_by_position_notional() {
    let mut alpha = venue("alpha", dec!(4));
    alpha.max_position_notional = dec!(50);
    let mut h = harness_with(alpha, venue("beta", dec!(5)), DetectorSettings::default());
    let now = Utc::now();
    publish_dislocation(&mut h, "BTCUSDT", now);

    let signals = evaluate(&mut h, "BTCUSDT", now);
    assert_eq!(signals.len(), 1);
    let expected = dec!(50) / dec!(100.25);
    assert_eq!(signals[0].opportunity.quantity, expected);
    assert!(signals[0].opportunity.quantity < dec!(1));
}

#[test]
fn test_quantity_below_min_notional_is_rejected() {
    let mut beta = venue("beta", dec!(5));
    beta.min_notional = dec!(500);
    let mut h = harness_with(venue("alpha", dec!(4)), beta, DetectorSettings::default());
    let now = Utc::now();
    publish_dislocation(&mut h, "BTCUSDT", now);

    assert!(evaluate(&mut h, "BTCUSDT", now).is_empty());
}

#[test]
fn test_quantity_exhausting_depth_is_accepted() {
    let mut h = harness();
    let now = Utc::now();
    h.router.publish(book("alpha", "BTCUSDT", &[(dec!(99.90), dec!(0.4))], &[(dec!(100.00), dec!(0.4))], now));
    h.router.publish(book("beta", "BTCUSDT", &[(dec!(100.50), dec!(0.4))], &[(dec!(100.60), dec!(0.4))], now));

    let signals = evaluate(&mut h, "BTCUSDT", now);
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].opportunity.quantity, dec!(0.4));
}

#[test]
fn test_both_directions_can_signal() {
    let alpha = venue("alpha", Decimal::ZERO);
    let settings = DetectorSettings {
        slippage_bps: Decimal::ZERO,
        min_net_spread_bps: dec!(-100),
        ..DetectorSettings::default()
    };
    let mut h = harness_with(alpha, venue("beta", Decimal::ZERO), settings);
    let now = Utc::now();
    publish_dislocation(&mut h, "BTCUSDT", now);

    let signals = evaluate(&mut h, "BTCUSDT", now);
    let directions: Vec<String> = signals.iter().map(|s| s.opportunity.direction()).collect();
    assert_eq!(directions, vec!["alpha->beta", "beta->alpha"]);
}

#[test]
fn test_from_config_orders_venues_by_name() {
    let yaml = r#"
app:
  name: test
exchanges:
  zeta:
    enabled: true
    taker_fee_bps: 5
    min_notional: 10
    max_position_notional: 1000
  alpha:
    enabled: true
    taker_fee_bps: 4
    min_notional: 20
    max_position_notional: 2000
pairs:
  - BTCUSDT
orderbook:
  max_age: 0s
"#;
    let config = Config::from_yaml(yaml).unwrap();
    let detector = OpportunityDetector::from_config(&config, Arc::new(EventBus::new())).unwrap();

    let venues = detector.venues();
    assert_eq!(venues[0].name, "alpha");
    assert_eq!(venues[0].taker_fee_bps, dec!(4));
    assert_eq!(venues[0].min_notional, dec!(20));
    assert_eq!(venues[1].name, "zeta");

    let settings = DetectorSettings::from_config(&config);
    assert!(settings.max_book_age.is_none());
    assert_eq!(settings.signal_ttl, Duration::seconds(2));
}

#[test]
fn test_from_config_requires_two_venues() {
    let yaml = r#"
app:
  name: test
exchanges:
  alpha:
    enabled: true
    min_notional: 10
    max_position_notional: 1000
pairs:
  - BTCUSDT
"#;
    let config = Config::from_yaml(yaml).unwrap();
    assert!(OpportunityDetector::from_config(&config, Arc::new(EventBus::new())).is_err());
}
