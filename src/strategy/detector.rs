//! Opportunity detector.
//!
//! Evaluates both directions between the two configured venues every time a
//! snapshot arrives for an instrument and emits an [`ExecutionSignal`] for
//! each direction whose net spread clears the threshold, subject to a
//! per-direction cooldown and a global cap on unresolved signals.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{Config, ConfigError, ExchangeConfig, REQUIRED_VENUES, duration};
use crate::domain::pricing::{SpreadInputs, effective_price, net_spread_bps};
use crate::domain::{ExecutionReport, ExecutionSignal, Opportunity, OrderBookSnapshot};
use crate::events::EventBus;
use crate::market::OrderBookRouter;

/// The per-venue values detection needs.
#[derive(Debug, Clone, PartialEq)]
pub struct VenueProfile {
    pub name: String,
    pub taker_fee_bps: Decimal,
    pub min_notional: Decimal,
    pub max_position_notional: Decimal,
}

impl VenueProfile {
    pub fn from_config(name: &str, config: &ExchangeConfig) -> Self {
        Self {
            name: name.to_string(),
            taker_fee_bps: config.fees().taker_bps,
            min_notional: config.min_notional,
            max_position_notional: config.max_position_notional,
        }
    }
}

/// Detection thresholds and timings.
#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub slippage_bps: Decimal,
    pub min_net_spread_bps: Decimal,
    pub max_concurrent_signals: usize,
    pub signal_ttl: Duration,
    /// Snapshots older than this are treated as absent. None disables the check.
    pub max_book_age: Option<Duration>,
    pub gap_log_interval: Duration,
}

impl DetectorSettings {
    pub fn from_config(config: &Config) -> Self {
        let arbitrage = &config.arbitrage;
        let max_age = config.orderbook.max_age;

        Self {
            slippage_bps: arbitrage.slippage_bps,
            min_net_spread_bps: arbitrage.min_net_spread_bps,
            max_concurrent_signals: arbitrage.max_concurrent_signals,
            signal_ttl: duration::to_chrono(arbitrage.signal_ttl),
            max_book_age: (!max_age.is_zero()).then(|| duration::to_chrono(max_age)),
            gap_log_interval: duration::to_chrono(arbitrage.gap_log_interval),
        }
    }
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            slippage_bps: Decimal::from(5),
            min_net_spread_bps: Decimal::from(15),
            max_concurrent_signals: 3,
            signal_ttl: Duration::seconds(2),
            max_book_age: Some(Duration::seconds(5)),
            gap_log_interval: Duration::seconds(5),
        }
    }
}

/// OpportunityDetector owns cooldowns and the set of unresolved signals.
///
/// It is driven from a single task; nothing here is shared.
pub struct OpportunityDetector {
    venues: [VenueProfile; REQUIRED_VENUES],
    settings: DetectorSettings,
    bus: Arc<EventBus>,
    /// `instrument:buy->sell` -> time the direction may signal again.
    cooldowns: HashMap<String, DateTime<Utc>>,
    /// Emitted opportunity id -> time its slot is released even without a
    /// report. A breaker-dropped signal never gets one.
    active: HashMap<String, DateTime<Utc>>,
    /// Instrument -> last time a missing or stale book was logged.
    gap_logged_at: HashMap<String, DateTime<Utc>>,
}

impl OpportunityDetector {
    pub fn new(
        venue_a: VenueProfile,
        venue_b: VenueProfile,
        settings: DetectorSettings,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            venues: [venue_a, venue_b],
            settings,
            bus,
            cooldowns: HashMap::new(),
            active: HashMap::new(),
            gap_logged_at: HashMap::new(),
        }
    }

    /// Builds a detector for the two enabled venues, in name order.
    pub fn from_config(config: &Config, bus: Arc<EventBus>) -> Result<Self, ConfigError> {
        let venues = config.enabled_venues();
        let [(name_a, cfg_a), (name_b, cfg_b)] = venues.as_slice() else {
            return Err(ConfigError::Validation(format!(
                "exactly {} exchanges must be enabled, found {}",
                REQUIRED_VENUES,
                venues.len()
            )));
        };

        Ok(Self::new(
            VenueProfile::from_config(name_a, cfg_a),
            VenueProfile::from_config(name_b, cfg_b),
            DetectorSettings::from_config(config),
            bus,
        ))
    }

    /// Number of emitted signals still waiting for a report.
    pub fn active_signals(&self) -> usize {
        self.active.len()
    }

    pub fn venues(&self) -> &[VenueProfile] {
        &self.venues
    }

    /// Evaluates `instrument` after a snapshot arrived for it.
    pub fn on_snapshot(&mut self, router: &OrderBookRouter, instrument: &str) -> Vec<ExecutionSignal> {
        self.on_snapshot_at(router, instrument, Utc::now())
    }

    /// Evaluates both directions for `instrument` at `now` and returns the
    /// signals that were published.
    pub fn on_snapshot_at(
        &mut self,
        router: &OrderBookRouter,
        instrument: &str,
        now: DateTime<Utc>,
    ) -> Vec<ExecutionSignal> {
        self.release_abandoned(now);

        let book_a = self.fresh_book(router, 0, instrument, now);
        let book_b = self.fresh_book(router, 1, instrument, now);

        let (Some(book_a), Some(book_b)) = (book_a, book_b) else {
            self.log_gap(instrument, now);
            return Vec::new();
        };

        let mut signals = Vec::new();
        if let Some(signal) = self.check_direction(instrument, book_a, book_b, 0, 1, now) {
            signals.push(signal);
        }
        if let Some(signal) = self.check_direction(instrument, book_b, book_a, 1, 0, now) {
            signals.push(signal);
        }
        signals
    }

    /// Frees the capacity held by the reported opportunity.
    pub fn on_report(&mut self, report: &ExecutionReport) {
        if self.active.remove(&report.opportunity_id).is_some() {
            debug!(
                opportunity_id = %report.opportunity_id,
                success = report.success,
                active = self.active.len(),
                "Signal resolved"
            );
        }
    }

    /// Drops unresolved signals one TTL past their expiry.
    fn release_abandoned(&mut self, now: DateTime<Utc>) {
        self.active.retain(|id, release_at| {
            let keep = *release_at > now;
            if !keep {
                warn!(opportunity_id = %id, "Releasing signal that never got a report");
            }
            keep
        });
    }

    /// Returns the cached book unless it is older than the staleness limit.
    fn fresh_book<'r>(
        &self,
        router: &'r OrderBookRouter,
        venue: usize,
        instrument: &str,
        now: DateTime<Utc>,
    ) -> Option<&'r OrderBookSnapshot> {
        let book = router.get_snapshot(&self.venues[venue].name, instrument)?;
        match self.settings.max_book_age {
            Some(max_age) if book.age_at(now) > max_age => None,
            _ => Some(book),
        }
    }

    fn log_gap(&mut self, instrument: &str, now: DateTime<Utc>) {
        let due = self
            .gap_logged_at
            .get(instrument)
            .is_none_or(|last| *last + self.settings.gap_log_interval <= now);

        if due {
            self.gap_logged_at.insert(instrument.to_string(), now);
            debug!(
                instrument = %instrument,
                venue_a = %self.venues[0].name,
                venue_b = %self.venues[1].name,
                "Waiting for fresh books on both venues"
            );
        }
    }

    fn check_direction(
        &mut self,
        instrument: &str,
        buy_book: &OrderBookSnapshot,
        sell_book: &OrderBookSnapshot,
        buy_idx: usize,
        sell_idx: usize,
        now: DateTime<Utc>,
    ) -> Option<ExecutionSignal> {
        let buy = &self.venues[buy_idx];
        let sell = &self.venues[sell_idx];
        let direction = format!("{}->{}", buy.name, sell.name);

        let (best_ask, best_bid) = (buy_book.best_ask()?, sell_book.best_bid()?);

        let indicative_price = (best_ask.price + best_bid.price) / Decimal::TWO;
        let min_notional = buy.min_notional.max(sell.min_notional);
        let max_notional = buy.max_position_notional.min(sell.max_position_notional);
        let min_qty = min_notional.checked_div(indicative_price)?;
        let max_qty = max_notional.checked_div(indicative_price)?;
        let depth_qty = best_ask.size.min(best_bid.size);
        let quantity = depth_qty.min(max_qty);

        if quantity <= Decimal::ZERO || quantity < min_qty {
            debug!(
                instrument = %instrument,
                direction = %direction,
                quantity = %quantity,
                min_qty = %min_qty,
                "Quantity below venue minimums"
            );
            return None;
        }

        let (Some(buy_price), Some(sell_price)) = (
            effective_price(&buy_book.asks, quantity),
            effective_price(&sell_book.bids, quantity),
        ) else {
            debug!(instrument = %instrument, direction = %direction, "Insufficient depth");
            return None;
        };

        let net_bps = net_spread_bps(&SpreadInputs {
            buy_price,
            sell_price,
            buy_fee_bps: buy.taker_fee_bps,
            sell_fee_bps: sell.taker_fee_bps,
            slippage_bps: self.settings.slippage_bps,
        });

        debug!(
            instrument = %instrument,
            direction = %direction,
            buy_price = %buy_price.round_dp(2),
            sell_price = %sell_price.round_dp(2),
            net_bps = %net_bps.round_dp(3),
            "Spread snapshot"
        );

        if net_bps < self.settings.min_net_spread_bps {
            if net_bps > Decimal::NEGATIVE_ONE {
                debug!(
                    instrument = %instrument,
                    direction = %direction,
                    net_bps = %net_bps.round_dp(3),
                    threshold = %self.settings.min_net_spread_bps,
                    "Near signal"
                );
            }
            return None;
        }

        if self.active.len() >= self.settings.max_concurrent_signals {
            debug!(
                instrument = %instrument,
                direction = %direction,
                active = self.active.len(),
                "Concurrent signal limit reached"
            );
            return None;
        }

        let key = format!("{}:{}", instrument, direction);
        if self.cooldowns.get(&key).is_some_and(|ready_at| *ready_at > now) {
            debug!(instrument = %instrument, direction = %direction, "Direction cooling down");
            return None;
        }

        let opportunity = Opportunity {
            id: Uuid::new_v4().to_string(),
            instrument: instrument.to_string(),
            buy_venue: buy.name.clone(),
            sell_venue: sell.name.clone(),
            quantity,
            buy_price,
            sell_price,
            gross_spread_bps: net_bps + self.settings.slippage_bps * Decimal::TWO,
            net_spread_bps: net_bps,
            detected_at: now,
            expires_at: now + self.settings.signal_ttl,
        };

        let signal = ExecutionSignal {
            opportunity,
            max_slippage_bps: self.settings.slippage_bps,
            created_at: now,
        };

        self.active.insert(
            signal.opportunity.id.clone(),
            signal.opportunity.expires_at + self.settings.signal_ttl,
        );
        self.cooldowns.insert(key, now + self.settings.signal_ttl);
        self.bus.publish_signal(signal.clone());

        info!(
            opportunity_id = %signal.opportunity.id,
            instrument = %instrument,
            direction = %direction,
            quantity = %quantity.round_dp(6),
            net_spread_bps = %net_bps.round_dp(2),
            "Emitted execution signal"
        );

        Some(signal)
    }
}
