//! Summary of recorded trades, printed by `--report`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use rust_decimal::Decimal;

use crate::execution::BalanceLedger;
use crate::storage::TradeRecord;

/// Aggregate view of a trade log, with balances replayed from a common
/// starting balance per venue.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeReport {
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub net_pnl: Decimal,
    /// Sum of both legs' notionals.
    pub gross_notional: Decimal,
    pub initial_balance: Decimal,
    pub balances: BTreeMap<String, Decimal>,
}

impl TradeReport {
    /// Builds the report. Venues seen only in `records` are seeded too.
    pub fn from_records(records: &[TradeRecord], venues: &[String], initial_balance: Decimal) -> Self {
        let names: BTreeSet<&str> = venues
            .iter()
            .map(String::as_str)
            .chain(records.iter().flat_map(|r| [r.buy_venue.as_str(), r.sell_venue.as_str()]))
            .collect();
        let mut ledger = BalanceLedger::new(names, initial_balance);

        let mut report = Self {
            trades: records.len(),
            wins: 0,
            losses: 0,
            net_pnl: Decimal::ZERO,
            gross_notional: Decimal::ZERO,
            initial_balance,
            balances: BTreeMap::new(),
        };

        for record in records {
            let buy_notional = record.quantity * record.buy_price;
            let sell_notional = record.quantity * record.sell_price;
            ledger.apply_trade(&record.buy_venue, &record.sell_venue, buy_notional, sell_notional);

            report.net_pnl += record.pnl;
            report.gross_notional += buy_notional + sell_notional;
            if record.pnl >= Decimal::ZERO {
                report.wins += 1;
            } else {
                report.losses += 1;
            }
        }

        report.balances = ledger.snapshot();
        report
    }

    pub fn win_rate_pct(&self) -> Decimal {
        if self.trades == 0 {
            return Decimal::ZERO;
        }
        Decimal::from(self.wins) * Decimal::ONE_HUNDRED / Decimal::from(self.trades)
    }

    pub fn avg_pnl(&self) -> Decimal {
        if self.trades == 0 {
            return Decimal::ZERO;
        }
        self.net_pnl / Decimal::from(self.trades)
    }

    pub fn avg_leg_notional(&self) -> Decimal {
        if self.trades == 0 {
            return Decimal::ZERO;
        }
        self.gross_notional / Decimal::from(self.trades * 2)
    }
}

impl fmt::Display for TradeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.trades == 0 {
            return writeln!(f, "No trades recorded yet.");
        }

        writeln!(f, "=== Dry-Run Summary ===")?;
        writeln!(f, "Trades: {}", self.trades)?;
        writeln!(
            f,
            "Wins/Losses: {}/{} ({:.1}% win rate)",
            self.wins,
            self.losses,
            self.win_rate_pct()
        )?;
        writeln!(f, "Net PnL: ${:.2}", self.net_pnl)?;
        writeln!(
            f,
            "Avg PnL per trade: ${:.2}, Avg notional per leg: ${:.2}",
            self.avg_pnl(),
            self.avg_leg_notional()
        )?;
        writeln!(f)?;
        writeln!(
            f,
            "Exchange Balances (assuming initial ${:.2} each):",
            self.initial_balance
        )?;
        for (venue, balance) in &self.balances {
            let delta = *balance - self.initial_balance;
            let sign = if delta >= Decimal::ZERO { "+" } else { "" };
            writeln!(
                f,
                "- {}: start ${:.2} -> end ${:.2} ({}{:.2})",
                venue, self.initial_balance, balance, sign, delta
            )?;
        }
        Ok(())
    }
}
