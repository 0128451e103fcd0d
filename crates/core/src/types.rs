//! Domain types shared by the gateway adapters and the hedging engine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ConfigError;

/// Asset whose delta is hedged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Symbol {
    Btc,
    Eth,
}

impl Symbol {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Btc => "BTC",
            Self::Eth => "ETH",
        }
    }

    /// Perpetual contract used as the hedge instrument (e.g. `BTC-PERPETUAL`).
    #[must_use]
    pub fn perpetual(self) -> String {
        format!("{}-PERPETUAL", self.as_str())
    }

    /// Reference index identifier (e.g. `btc_usd`).
    #[must_use]
    pub fn index_name(self) -> String {
        format!("{}_usd", self.as_str().to_lowercase())
    }

    /// Order amount step of the perpetual, in USD.
    #[must_use]
    pub fn contract_size(self) -> Decimal {
        match self {
            Self::Btc => Decimal::TEN,
            Self::Eth => Decimal::ONE,
        }
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Symbol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BTC" => Ok(Self::Btc),
            "ETH" => Ok(Self::Eth),
            _ => Err(ConfigError::UnsupportedSymbol(s.to_string())),
        }
    }
}

impl TryFrom<String> for Symbol {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.as_str().to_string()
    }
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// +1 for buys, -1 for sells.
    #[must_use]
    pub fn sign(self) -> Decimal {
        match self {
            Self::Buy => Decimal::ONE,
            Self::Sell => Decimal::NEGATIVE_ONE,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// One OHLCV candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl OhlcvBar {
    /// Mean of open, high, low and close.
    #[must_use]
    pub fn ohlc_mean(&self) -> Decimal {
        (self.open + self.high + self.low + self.close) / Decimal::from(4)
    }
}

/// Top of the order book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookTop {
    pub best_bid: Decimal,
    pub best_ask: Decimal,
}

impl BookTop {
    /// Price that joins our side of the book without crossing the spread.
    #[must_use]
    pub const fn joining_price(&self, side: Side) -> Decimal {
        match side {
            Side::Buy => self.best_bid,
            Side::Sell => self.best_ask,
        }
    }

    #[must_use]
    pub fn spread(&self) -> Decimal {
        self.best_ask - self.best_bid
    }
}

/// Lifecycle status of an exchange order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Filled,
    Cancelled,
    Rejected,
    Untriggered,
}

impl OrderStatus {
    /// True while the order can still trade and must be managed.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open | Self::Untriggered)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Filled => write!(f, "filled"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Rejected => write!(f, "rejected"),
            Self::Untriggered => write!(f, "untriggered"),
        }
    }
}

/// Snapshot of a single order as reported by the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderState {
    pub order_id: String,
    pub instrument: String,
    pub side: Side,
    pub status: OrderStatus,
    pub amount: Decimal,
    pub filled: Decimal,
    pub average_price: Option<Decimal>,
}

impl OrderState {
    /// Unfilled quantity, never negative.
    #[must_use]
    pub fn remaining(&self) -> Decimal {
        (self.amount - self.filled).max(Decimal::ZERO)
    }

    #[must_use]
    pub fn is_fully_filled(&self) -> bool {
        self.remaining().is_zero()
    }
}

/// Open position in a perpetual contract. Negative size is short.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerpetualPosition {
    pub instrument: String,
    pub size: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn symbol_parses_supported_assets_only() {
        assert_eq!("BTC".parse::<Symbol>().unwrap(), Symbol::Btc);
        assert_eq!("eth".parse::<Symbol>().unwrap(), Symbol::Eth);
        assert_eq!(
            "SOL".parse::<Symbol>(),
            Err(ConfigError::UnsupportedSymbol("SOL".to_string()))
        );
    }

    #[test]
    fn symbol_instrument_names() {
        assert_eq!(Symbol::Btc.perpetual(), "BTC-PERPETUAL");
        assert_eq!(Symbol::Eth.index_name(), "eth_usd");
    }

    #[test]
    fn symbol_serde_uses_ticker() {
        let json = serde_json::to_string(&Symbol::Eth).unwrap();
        assert_eq!(json, "\"ETH\"");
        let parsed: Symbol = serde_json::from_str("\"btc\"").unwrap();
        assert_eq!(parsed, Symbol::Btc);
        assert!(serde_json::from_str::<Symbol>("\"DOGE\"").is_err());
    }

    #[test]
    fn ohlc_mean_averages_four_prices() {
        let bar = OhlcvBar {
            timestamp: Utc::now(),
            open: dec!(31000),
            high: dec!(31400),
            low: dec!(30900),
            close: dec!(31500),
            volume: dec!(12),
        };
        assert_eq!(bar.ohlc_mean(), dec!(31200));
    }

    #[test]
    fn joining_price_does_not_cross() {
        let top = BookTop {
            best_bid: dec!(100.0),
            best_ask: dec!(100.5),
        };
        assert_eq!(top.joining_price(Side::Buy), dec!(100.0));
        assert_eq!(top.joining_price(Side::Sell), dec!(100.5));
        assert_eq!(top.spread(), dec!(0.5));
    }

    #[test]
    fn order_remaining_clamps_at_zero() {
        let mut order = OrderState {
            order_id: "1".to_string(),
            instrument: "BTC-PERPETUAL".to_string(),
            side: Side::Buy,
            status: OrderStatus::Open,
            amount: dec!(100),
            filled: dec!(40),
            average_price: None,
        };
        assert_eq!(order.remaining(), dec!(60));
        order.filled = dec!(110);
        assert!(order.is_fully_filled());
    }
}
