//! Simulated per-venue notional balances.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;

/// BalanceLedger tracks one quote balance per venue during a dry run.
///
/// It enforces nothing: callers check [`BalanceLedger::can_debit`] before
/// [`BalanceLedger::apply_trade`], otherwise balances may go negative.
#[derive(Debug, Clone)]
pub struct BalanceLedger {
    initial_balance: Decimal,
    balances: HashMap<String, Decimal>,
}

impl BalanceLedger {
    /// Seeds every venue with `initial_balance`.
    pub fn new<I, S>(venues: I, initial_balance: Decimal) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            initial_balance,
            balances: venues
                .into_iter()
                .map(|venue| (venue.into(), initial_balance))
                .collect(),
        }
    }

    /// Current balance; zero for unknown venues.
    pub fn balance_of(&self, venue: &str) -> Decimal {
        self.balances.get(venue).copied().unwrap_or_default()
    }

    pub fn can_debit(&self, venue: &str, amount: Decimal) -> bool {
        self.balance_of(venue) >= amount
    }

    /// Debits the buy venue and credits the sell venue.
    pub fn apply_trade(
        &mut self,
        buy_venue: &str,
        sell_venue: &str,
        buy_notional: Decimal,
        sell_notional: Decimal,
    ) {
        *self.balances.entry(buy_venue.to_string()).or_default() -= buy_notional;
        *self.balances.entry(sell_venue.to_string()).or_default() += sell_notional;
    }

    /// Balances sorted by venue name.
    pub fn snapshot(&self) -> BTreeMap<String, Decimal> {
        self.balances
            .iter()
            .map(|(venue, balance)| (venue.clone(), *balance))
            .collect()
    }

    /// Restores every tracked venue to the initial balance.
    pub fn reset(&mut self) {
        for balance in self.balances.values_mut() {
            *balance = self.initial_balance;
        }
    }
}
