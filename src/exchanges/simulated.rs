//! Synthetic venue producing random-walk order books.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{ExchangeError, Result, VenueConnector, VenueEvent, VenueEventSender, fill_at_limit};
use crate::config::ExchangeConfig;
use crate::domain::pricing::bps_to_decimal;
use crate::domain::{BalanceSummary, OrderBookSnapshot, OrderRequest, OrderResult, PriceLevel};

/// Feed cadence never goes below this.
const MIN_CADENCE: Duration = Duration::from_millis(200);

/// Relative half-spread around the mid.
const HALF_SPREAD: f64 = 0.0005;

/// Relative per-tick noise amplitude of the mid.
const MID_NOISE: f64 = 0.001;

/// Balances every simulated venue reports on start.
const SEED_BALANCES: [(&str, u32); 3] = [("USDT", 100_000), ("BTC", 5), ("ETH", 100)];

/// Starting mid for an instrument.
fn base_price(instrument: &str) -> Decimal {
    if instrument.starts_with("BTC") {
        Decimal::from(60_000)
    } else if instrument.starts_with("ETH") {
        Decimal::from(3_000)
    } else {
        Decimal::ONE
    }
}

fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

/// Random-walk book generator. One per running feed.
pub(crate) struct BookGenerator {
    mids: HashMap<String, Decimal>,
    skew_bps: Decimal,
    sequence: u64,
    rng: StdRng,
}

impl BookGenerator {
    pub(crate) fn new(skew_bps: Decimal, rng: StdRng) -> Self {
        Self {
            mids: HashMap::new(),
            skew_bps,
            sequence: 0,
            rng,
        }
    }

    fn next_mid(&mut self, instrument: &str) -> Decimal {
        let noise = 1.0 + (self.rng.r#gen::<f64>() - 0.5) * MID_NOISE;
        let mid = self
            .mids
            .entry(instrument.to_string())
            .or_insert_with(|| base_price(instrument));
        *mid *= to_decimal(noise);
        *mid
    }

    fn size(&mut self) -> Decimal {
        to_decimal(0.5 + self.rng.r#gen::<f64>()).round_dp(4)
    }

    /// Produces the next two-level book for `instrument`.
    pub(crate) fn next_snapshot(
        &mut self,
        venue: &str,
        instrument: &str,
        now: DateTime<Utc>,
    ) -> OrderBookSnapshot {
        let mid = self.next_mid(instrument);
        let half_spread = mid * to_decimal(HALF_SPREAD);
        let skew = mid * bps_to_decimal(self.skew_bps);
        let scale = if mid >= Decimal::ONE_HUNDRED { 2 } else { 6 };

        let bid = mid - half_spread + skew;
        let ask = mid + half_spread + skew;
        let bid_step = half_spread * to_decimal(self.rng.r#gen::<f64>());
        let ask_step = half_spread * to_decimal(self.rng.r#gen::<f64>());

        let bids = vec![
            PriceLevel::new(bid.round_dp(scale), self.size()),
            PriceLevel::new((bid - bid_step).round_dp(scale), self.size()),
        ];
        let asks = vec![
            PriceLevel::new(ask.round_dp(scale), self.size()),
            PriceLevel::new((ask + ask_step).round_dp(scale), self.size()),
        ];

        self.sequence += 1;
        OrderBookSnapshot::new(venue, instrument, bids, asks, self.sequence, now)
    }
}

/// SimulatedVenue emits synthetic books without any network access.
pub struct SimulatedVenue {
    name: String,
    skew_bps: Decimal,
    cadence: Duration,
    seed: Option<u64>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SimulatedVenue {
    pub fn new(name: &str, config: &ExchangeConfig) -> Self {
        Self {
            name: name.to_string(),
            skew_bps: config.skew_bps,
            cadence: config.target_latency.max(MIN_CADENCE),
            seed: None,
            task: Mutex::new(None),
        }
    }

    /// Makes the feed deterministic.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Interval between two generated books per instrument.
    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    fn emit_balances(&self, events: &VenueEventSender) {
        let now = Utc::now();
        for (asset, free) in SEED_BALANCES {
            let balance = BalanceSummary {
                venue: self.name.clone(),
                asset: asset.to_string(),
                free: Decimal::from(free),
                locked: Decimal::ZERO,
                timestamp: now,
            };
            let _ = events.send(VenueEvent::Balance(balance));
        }
    }
}

#[async_trait]
impl VenueConnector for SimulatedVenue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, instruments: Vec<String>, events: VenueEventSender) -> Result<()> {
        let mut task = self.task.lock().await;
        if task.is_some() {
            warn!(exchange = %self.name, "Simulated feed already running");
            return Ok(());
        }

        self.emit_balances(&events);

        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut generator = BookGenerator::new(self.skew_bps, rng);
        let venue = self.name.clone();
        let cadence = self.cadence;

        *task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(cadence);
            loop {
                interval.tick().await;
                for instrument in &instruments {
                    let snapshot = generator.next_snapshot(&venue, instrument, Utc::now());
                    if events.send(VenueEvent::OrderBook(snapshot)).is_err() {
                        debug!(exchange = %venue, "Event channel closed, stopping feed");
                        return;
                    }
                }
            }
        }));

        info!(exchange = %self.name, cadence = ?self.cadence, "Simulated exchange started");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
            info!(exchange = %self.name, "Simulated exchange stopped");
        }
        Ok(())
    }

    async fn place_order(&self, request: OrderRequest) -> Result<OrderResult> {
        if self.task.lock().await.is_none() {
            return Err(ExchangeError::NotRunning(self.name.clone()));
        }
        debug!(exchange = %self.name, request = ?request, "Simulated order placement");
        Ok(fill_at_limit(&request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OrderSide;
    use rust_decimal_macros::dec;
    use tokio::sync::mpsc;

    fn exchange_config(skew_bps: Decimal, target_latency: Duration) -> ExchangeConfig {
        let yaml = format!(
            "enabled: true\nmin_notional: 10\nmax_position_notional: 1000\nskew_bps: {}\ntarget_latency: {}ms\n",
            skew_bps,
            target_latency.as_millis()
        );
        serde_yaml::from_str(&yaml).unwrap()
    }

    #[test]
    fn test_generated_book_is_sane() {
        let mut generator = BookGenerator::new(Decimal::ZERO, StdRng::seed_from_u64(7));
        let book = generator.next_snapshot("alpha", "BTCUSDT", Utc::now());

        assert_eq!(book.venue, "alpha");
        assert_eq!(book.instrument, "BTCUSDT");
        assert_eq!(book.bids.len(), 2);
        assert_eq!(book.asks.len(), 2);
        assert!(book.top_of_book_spread().unwrap() < Decimal::ZERO);

        let bid = book.best_bid().unwrap().price;
        assert!(bid > dec!(59000) && bid < dec!(61000));
        assert!(book.bids[0].price >= book.bids[1].price);
        assert!(book.asks[0].price <= book.asks[1].price);
    }

    #[test]
    fn test_same_seed_same_books() {
        let mut a = BookGenerator::new(Decimal::ZERO, StdRng::seed_from_u64(42));
        let mut b = BookGenerator::new(Decimal::ZERO, StdRng::seed_from_u64(42));
        let now = Utc::now();

        for _ in 0..5 {
            let left = a.next_snapshot("alpha", "ETHUSDT", now);
            let right = b.next_snapshot("alpha", "ETHUSDT", now);
            assert_eq!(left.bids, right.bids);
            assert_eq!(left.asks, right.asks);
            assert_eq!(left.sequence, right.sequence);
        }
    }

    #[test]
    fn test_skew_shifts_prices_up() {
        let now = Utc::now();
        let mut flat = BookGenerator::new(Decimal::ZERO, StdRng::seed_from_u64(1));
        let mut skewed = BookGenerator::new(dec!(20), StdRng::seed_from_u64(1));

        let flat_book = flat.next_snapshot("alpha", "BTCUSDT", now);
        let skewed_book = skewed.next_snapshot("beta", "BTCUSDT", now);

        assert!(skewed_book.best_bid().unwrap().price > flat_book.best_bid().unwrap().price);
        assert!(skewed_book.best_ask().unwrap().price > flat_book.best_ask().unwrap().price);
    }

    #[test]
    fn test_cadence_has_floor() {
        let venue = SimulatedVenue::new("alpha", &exchange_config(Decimal::ZERO, Duration::from_millis(50)));
        assert_eq!(venue.cadence(), MIN_CADENCE);

        let venue = SimulatedVenue::new("alpha", &exchange_config(Decimal::ZERO, Duration::from_millis(750)));
        assert_eq!(venue.cadence(), Duration::from_millis(750));
    }

    #[tokio::test]
    async fn test_start_emits_balances_then_books() {
        let venue = SimulatedVenue::new("alpha", &exchange_config(Decimal::ZERO, Duration::ZERO)).with_seed(3);
        let (tx, mut rx) = mpsc::unbounded_channel();

        venue.start(vec!["BTCUSDT".to_string()], tx).await.unwrap();

        for asset in ["USDT", "BTC", "ETH"] {
            match rx.recv().await.unwrap() {
                VenueEvent::Balance(balance) => {
                    assert_eq!(balance.venue, "alpha");
                    assert_eq!(balance.asset, asset);
                }
                other => panic!("expected balance, got {:?}", other),
            }
        }

        match rx.recv().await.unwrap() {
            VenueEvent::OrderBook(book) => assert_eq!(book.instrument, "BTCUSDT"),
            other => panic!("expected order book, got {:?}", other),
        }

        venue.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_place_order_requires_running_feed() {
        let venue = SimulatedVenue::new("alpha", &exchange_config(Decimal::ZERO, Duration::ZERO));
        let request = OrderRequest::limit("BTCUSDT", OrderSide::Buy, dec!(0.5), dec!(100));

        let result = venue.place_order(request.clone()).await;
        assert!(matches!(result, Err(ExchangeError::NotRunning(_))));

        let (tx, _rx) = mpsc::unbounded_channel();
        venue.start(vec!["BTCUSDT".to_string()], tx).await.unwrap();

        let result = venue.place_order(request).await.unwrap();
        assert!(result.is_filled());
        assert_eq!(result.filled_qty, dec!(0.5));
        assert_eq!(result.avg_price, dec!(100));

        venue.stop().await.unwrap();
    }
}
