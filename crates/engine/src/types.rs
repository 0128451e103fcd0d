//! Types for the hedging loop.

use delta_hedge_core::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Mutable state carried from one cycle to the next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HedgeRuntimeState {
    /// Set after the first executed hedge, never cleared.
    pub hedged_once: bool,
    /// Sleep chosen at the end of the last completed cycle.
    pub interval: Duration,
    pub cycles: u64,
    pub hedges: u64,
}

impl HedgeRuntimeState {
    #[must_use]
    pub const fn new(hedged_once: bool, interval: Duration) -> Self {
        Self {
            hedged_once,
            interval,
            cycles: 0,
            hedges: 0,
        }
    }

    /// Records an executed hedge.
    pub fn record_hedge(&mut self) {
        self.hedged_once = true;
        self.hedges += 1;
    }
}

/// Order the decision engine wants executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HedgeOrderIntent {
    pub side: Side,
    /// Positive quote-currency size.
    pub notional: Decimal,
}

/// Outcome of evaluating a delta snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Delta is zero or within tolerance.
    NoAction { delta: Decimal },
    Hedge(HedgeOrderIntent),
}

/// A price band derived from strike and band width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBand {
    /// Positive above strike, negative below.
    pub level: i32,
    pub price: Decimal,
}

impl PriceBand {
    #[must_use]
    pub const fn is_upper(&self) -> bool {
        self.level > 0
    }
}

/// Why the band monitor asked for a hedge evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BandTrigger {
    /// Index price is beyond the band.
    Breach(PriceBand),
    /// Open position should be re-evaluated. `None` in single-band mode,
    /// where any non-zero position triggers it.
    Unwind(Option<PriceBand>),
}

impl std::fmt::Display for BandTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Breach(band) => write!(f, "breach L{} @ {}", band.level, band.price),
            Self::Unwind(Some(band)) => write!(f, "unwind L{} @ {}", band.level, band.price),
            Self::Unwind(None) => write!(f, "unwind"),
        }
    }
}

/// What a completed chase did on the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaseReport {
    pub side: Side,
    pub requested: Decimal,
    pub limit_orders: u32,
    pub passive_filled: Decimal,
    pub market_filled: Decimal,
    /// The remainder was sent as a market order.
    pub escalated: bool,
    pub elapsed: Duration,
}

impl ChaseReport {
    #[must_use]
    pub fn total_filled(&self) -> Decimal {
        self.passive_filled + self.market_filled
    }
}

/// Returned by a single scheduler cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    Continue { next_delay: Duration },
    Fatal { cause: crate::error::HedgeError },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hedged_once_is_sticky() {
        let mut state = HedgeRuntimeState::new(false, Duration::from_secs(60));
        state.record_hedge();
        state.record_hedge();
        assert!(state.hedged_once);
        assert_eq!(state.hedges, 2);
    }
}
