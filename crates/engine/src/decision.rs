//! Hedge decision engine: side from the sign of delta, size from the latest bar.

use delta_hedge_core::{OhlcvBar, Side};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::types::{Decision, HedgeOrderIntent};

/// Side that offsets `delta`. Zero delta has no side.
#[must_use]
pub fn hedge_side(delta: Decimal) -> Option<Side> {
    if delta < Decimal::ZERO {
        Some(Side::Buy)
    } else if delta > Decimal::ZERO {
        Some(Side::Sell)
    } else {
        None
    }
}

/// Side to trade, or `None` when `|delta| < threshold` or delta is exactly zero.
#[must_use]
pub fn decide(delta: Decimal, threshold: Decimal) -> Option<Side> {
    let side = hedge_side(delta)?;
    (delta.abs() >= threshold.abs()).then_some(side)
}

/// Builds the order for `delta` priced at `avg_price`.
#[must_use]
pub fn plan_hedge(delta: Decimal, threshold: Decimal, avg_price: Decimal) -> Decision {
    match decide(delta, threshold) {
        Some(side) => Decision::Hedge(HedgeOrderIntent {
            side,
            notional: (delta * avg_price).abs(),
        }),
        None => Decision::NoAction { delta },
    }
}

/// Mean of open, high, low and close of the newest bar.
#[must_use]
pub fn average_price(bars: &[OhlcvBar]) -> Option<Decimal> {
    bars.last().map(OhlcvBar::ohlc_mean)
}

/// Rounds a notional to the nearest multiple of the contract size.
#[must_use]
pub fn round_to_contract(notional: Decimal, contract_size: Decimal) -> Decimal {
    if contract_size <= Decimal::ZERO {
        return notional;
    }
    (notional / contract_size).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        * contract_size
}
