//! Band monitor: which hedge evaluations the current index price calls for.

use delta_hedge_core::HedgeConfig;
use rust_decimal::Decimal;

use crate::types::{BandTrigger, PriceBand};

/// Price bands around the strike and the checks they trigger.
///
/// With `num_levels` unset or 1 there is one band on each side and any open
/// position is re-evaluated every cycle. With more levels, bands are checked
/// outward from the strike and each band runs its own unwind check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandMonitor {
    strike: Decimal,
    width: Decimal,
    levels: u32,
}

impl BandMonitor {
    #[must_use]
    pub fn new(config: &HedgeConfig) -> Self {
        Self {
            strike: config.strike,
            width: config.strike * config.price_change_percent,
            levels: config.num_levels.unwrap_or(1).max(1),
        }
    }

    #[must_use]
    pub const fn is_multi_level(&self) -> bool {
        self.levels > 1
    }

    /// `strike + level * strike * pct`.
    #[must_use]
    pub fn band(&self, level: i32) -> PriceBand {
        PriceBand {
            level,
            price: self.strike + Decimal::from(level) * self.width,
        }
    }

    /// All bands, least extreme first: +1, -1, +2, -2, ...
    #[must_use]
    pub fn bands(&self) -> Vec<PriceBand> {
        (1..=self.levels)
            .filter_map(|k| i32::try_from(k).ok())
            .flat_map(|k| [self.band(k), self.band(-k)])
            .collect()
    }

    /// Triggered checks for this cycle, in evaluation order. Every check is
    /// evaluated; several may fire together.
    #[must_use]
    pub fn evaluate(&self, index_price: Decimal, position: Decimal) -> Vec<BandTrigger> {
        let mut triggers = Vec::new();

        for band in self.bands() {
            if is_breached(band, index_price) {
                triggers.push(BandTrigger::Breach(band));
            }
            if self.is_multi_level() && is_retraced(band, index_price, position) {
                triggers.push(BandTrigger::Unwind(Some(band)));
            }
        }

        if !self.is_multi_level() && !position.is_zero() {
            triggers.push(BandTrigger::Unwind(None));
        }

        triggers
    }
}

fn is_breached(band: PriceBand, price: Decimal) -> bool {
    if band.is_upper() {
        price > band.price
    } else {
        price < band.price
    }
}

/// Position is open on the side of `band` and price is back inside it.
fn is_retraced(band: PriceBand, price: Decimal, position: Decimal) -> bool {
    if band.is_upper() {
        position > Decimal::ZERO && price < band.price
    } else {
        position < Decimal::ZERO && price > band.price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delta_hedge_core::Symbol;
    use rust_decimal_macros::dec;

    fn config(num_levels: Option<u32>) -> HedgeConfig {
        HedgeConfig {
            symbol: Symbol::Btc,
            threshold: dec!(0.01),
            strike: dec!(31000),
            price_change_percent: dec!(0.025),
            num_levels,
        }
    }

    #[test]
    fn single_band_levels() {
        let monitor = BandMonitor::new(&config(None));
        let bands = monitor.bands();
        assert_eq!(bands.len(), 2);
        assert_eq!(bands[0].price, dec!(31775));
        assert_eq!(bands[1].price, dec!(30225));
    }

    #[test]
    fn single_band_breach_is_strict() {
        let monitor = BandMonitor::new(&config(None));
        let eps = dec!(0.01);

        let above = monitor.evaluate(dec!(31775) + eps, Decimal::ZERO);
        assert_eq!(above, vec![BandTrigger::Breach(monitor.band(1))]);

        assert!(monitor.evaluate(dec!(31775) - eps, Decimal::ZERO).is_empty());
        assert!(monitor.evaluate(dec!(31775), Decimal::ZERO).is_empty());

        let below = monitor.evaluate(dec!(30225) - eps, Decimal::ZERO);
        assert_eq!(below, vec![BandTrigger::Breach(monitor.band(-1))]);
    }

    #[test]
    fn single_band_open_position_always_rechecks() {
        let monitor = BandMonitor::new(&config(Some(1)));
        let triggers = monitor.evaluate(dec!(31000), dec!(-1560));
        assert_eq!(triggers, vec![BandTrigger::Unwind(None)]);

        let both = monitor.evaluate(dec!(32000), dec!(100));
        assert_eq!(
            both,
            vec![
                BandTrigger::Breach(monitor.band(1)),
                BandTrigger::Unwind(None)
            ]
        );
    }

    #[test]
    fn multi_level_orders_bands_outward() {
        let monitor = BandMonitor::new(&config(Some(3)));
        let levels: Vec<i32> = monitor.bands().iter().map(|b| b.level).collect();
        assert_eq!(levels, vec![1, -1, 2, -2, 3, -3]);
        assert_eq!(monitor.band(3).price, dec!(33325));
        assert_eq!(monitor.band(-2).price, dec!(29450));
    }

    #[test]
    fn multi_level_between_second_and_third_band() {
        let monitor = BandMonitor::new(&config(Some(3)));
        let triggers = monitor.evaluate(dec!(33000), dec!(500));
        assert_eq!(
            triggers,
            vec![
                BandTrigger::Breach(monitor.band(1)),
                BandTrigger::Breach(monitor.band(2)),
                BandTrigger::Unwind(Some(monitor.band(3))),
            ]
        );
    }

    #[test]
    fn multi_level_flat_position_only_breaches() {
        let monitor = BandMonitor::new(&config(Some(3)));
        let triggers = monitor.evaluate(dec!(29000), Decimal::ZERO);
        assert_eq!(
            triggers,
            vec![
                BandTrigger::Breach(monitor.band(-1)),
                BandTrigger::Breach(monitor.band(-2)),
            ]
        );
    }

    #[test]
    fn multi_level_short_unwinds_on_lower_bands() {
        let monitor = BandMonitor::new(&config(Some(2)));
        let triggers = monitor.evaluate(dec!(31000), dec!(-100));
        assert_eq!(
            triggers,
            vec![
                BandTrigger::Unwind(Some(monitor.band(-1))),
                BandTrigger::Unwind(Some(monitor.band(-2))),
            ]
        );
    }

    #[test]
    fn evaluation_is_repeatable() {
        let monitor = BandMonitor::new(&config(Some(3)));
        let first = monitor.evaluate(dec!(33000), dec!(500));
        let second = monitor.evaluate(dec!(33000), dec!(500));
        assert_eq!(first, second);
        assert_eq!(monitor, BandMonitor::new(&config(Some(3))));
    }
}
