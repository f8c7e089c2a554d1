//! Spread and fill-price arithmetic.
//!
//! All helpers are pure. Basis points are carried as `Decimal` so fee and
//! slippage settings like `4.5` survive without float rounding.

use rust_decimal::Decimal;

use super::PriceLevel;

/// Number of basis points in one unit (1 bps = 0.01%).
pub const BPS_PER_UNIT: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

/// Converts basis points into a plain decimal fraction (e.g., 5 -> 0.0005).
pub fn bps_to_decimal(bps: Decimal) -> Decimal {
    bps / BPS_PER_UNIT
}

/// Converts a decimal fraction into basis points (e.g., 0.0005 -> 5).
pub fn decimal_to_bps(value: Decimal) -> Decimal {
    value * BPS_PER_UNIT
}

/// Returns the volume-weighted average price to fill `desired_size` by
/// consuming `levels` best-price-first.
///
/// Returns `None` when the levels cannot fill the size or the size is not
/// positive. A size that exactly exhausts the book is filled.
pub fn effective_price(levels: &[PriceLevel], desired_size: Decimal) -> Option<Decimal> {
    if desired_size <= Decimal::ZERO {
        return None;
    }

    let mut remaining = desired_size;
    let mut notional = Decimal::ZERO;

    for level in levels {
        let take = remaining.min(level.size);
        notional += take * level.price;
        remaining -= take;

        if remaining <= Decimal::ZERO {
            break;
        }
    }

    if remaining > Decimal::ZERO {
        return None;
    }

    notional.checked_div(desired_size)
}

/// Inputs for [`net_spread_bps`].
#[derive(Debug, Clone, Copy)]
pub struct SpreadInputs {
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub buy_fee_bps: Decimal,
    pub sell_fee_bps: Decimal,
    pub slippage_bps: Decimal,
}

/// Net spread in basis points after both taker fees and slippage on both
/// legs: `(sell - buy) / sell - (buy_fee + sell_fee + 2 * slippage) / 10_000`.
pub fn net_spread_bps(inputs: &SpreadInputs) -> Decimal {
    let gross = (inputs.sell_price - inputs.buy_price)
        .checked_div(inputs.sell_price)
        .unwrap_or(Decimal::ZERO);
    let costs = bps_to_decimal(
        inputs.buy_fee_bps + inputs.sell_fee_bps + Decimal::TWO * inputs.slippage_bps,
    );

    decimal_to_bps(gross - costs)
}
