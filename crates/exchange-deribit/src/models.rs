//! Response payloads of the Deribit v2 API, decoded with serde.

use chrono::{DateTime, Utc};
use delta_hedge_core::{GatewayError, OhlcvBar, OrderState, OrderStatus, Side};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AuthResult {
    pub access_token: String,
    pub expires_in: u64,
}

#[derive(Debug, Deserialize)]
pub struct IndexPrice {
    pub index_price: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct AccountSummary {
    pub delta_total: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct Position {
    pub instrument_name: String,
    pub size: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct OrderBook {
    pub best_bid_price: Option<Decimal>,
    pub best_ask_price: Option<Decimal>,
}

/// Columnar candles from `public/get_tradingview_chart_data`.
#[derive(Debug, Deserialize)]
pub struct ChartData {
    pub status: String,
    #[serde(default)]
    pub ticks: Vec<i64>,
    #[serde(default)]
    pub open: Vec<Decimal>,
    #[serde(default)]
    pub high: Vec<Decimal>,
    #[serde(default)]
    pub low: Vec<Decimal>,
    #[serde(default)]
    pub close: Vec<Decimal>,
    #[serde(default)]
    pub volume: Vec<Decimal>,
}

impl ChartData {
    /// Zips the columns into bars, keeping the newest `limit`, oldest first.
    ///
    /// # Errors
    /// Returns `Decode` if the columns have different lengths
    pub fn into_bars(self, limit: usize) -> Result<Vec<OhlcvBar>, GatewayError> {
        let len = self.ticks.len();
        let columns = [
            self.open.len(),
            self.high.len(),
            self.low.len(),
            self.close.len(),
            self.volume.len(),
        ];
        if columns.iter().any(|&c| c != len) {
            return Err(GatewayError::Decode(format!(
                "chart data columns disagree: ticks={len} others={columns:?}"
            )));
        }

        let skip = len.saturating_sub(limit);
        let bars = (skip..len)
            .map(|i| OhlcvBar {
                timestamp: DateTime::from_timestamp_millis(self.ticks[i]).unwrap_or_else(Utc::now),
                open: self.open[i],
                high: self.high[i],
                low: self.low[i],
                close: self.close[i],
                volume: self.volume[i],
            })
            .collect();
        Ok(bars)
    }
}

#[derive(Debug, Deserialize)]
pub struct OrderResponse {
    pub order: Order,
}

#[derive(Debug, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub instrument_name: String,
    pub direction: Side,
    pub order_state: String,
    pub amount: Decimal,
    #[serde(default)]
    pub filled_amount: Decimal,
    #[serde(default)]
    pub average_price: Option<Decimal>,
}

impl Order {
    fn status(&self) -> Result<OrderStatus, GatewayError> {
        match self.order_state.as_str() {
            "open" | "triggered" => Ok(OrderStatus::Open),
            "untriggered" => Ok(OrderStatus::Untriggered),
            "filled" => Ok(OrderStatus::Filled),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "rejected" => Ok(OrderStatus::Rejected),
            other => Err(GatewayError::Decode(format!("unknown order_state '{other}'"))),
        }
    }
}

impl TryFrom<Order> for OrderState {
    type Error = GatewayError;

    fn try_from(order: Order) -> Result<Self, Self::Error> {
        let status = order.status()?;
        Ok(Self {
            order_id: order.order_id,
            instrument: order.instrument_name,
            side: order.direction,
            status,
            amount: order.amount,
            filled: order.filled_amount,
            average_price: order.average_price.filter(|p| !p.is_zero()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn chart_data_keeps_newest_bars() {
        let json = r#"{
            "status": "ok",
            "ticks": [1000, 61000, 121000],
            "open": [1.0, 2.0, 3.0],
            "high": [1.5, 2.5, 3.5],
            "low": [0.5, 1.5, 2.5],
            "close": [1.2, 2.2, 3.2],
            "volume": [10.0, 20.0, 30.0],
            "cost": [0.0, 0.0, 0.0]
        }"#;
        let data: ChartData = serde_json::from_str(json).unwrap();
        let bars = data.into_bars(2).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].open, dec!(2.0));
        assert_eq!(bars[1].close, dec!(3.2));
        assert_eq!(bars[1].timestamp.timestamp_millis(), 121_000);
    }

    #[test]
    fn chart_data_without_bars_is_empty() {
        let data: ChartData = serde_json::from_str(r#"{"status":"no_data"}"#).unwrap();
        assert!(data.into_bars(10).unwrap().is_empty());
    }

    #[test]
    fn mismatched_columns_are_rejected() {
        let json = r#"{"status":"ok","ticks":[1,2],"open":[1.0],"high":[1.0,2.0],"low":[1.0,2.0],"close":[1.0,2.0],"volume":[1.0,2.0]}"#;
        let data: ChartData = serde_json::from_str(json).unwrap();
        assert!(matches!(data.into_bars(5), Err(GatewayError::Decode(_))));
    }

    #[test]
    fn order_maps_to_state() {
        let json = r#"{"order":{
            "order_id": "ETH-349280",
            "instrument_name": "ETH-PERPETUAL",
            "direction": "sell",
            "order_state": "open",
            "order_type": "limit",
            "post_only": true,
            "price": 1850.5,
            "amount": 40.0,
            "filled_amount": 10.0,
            "average_price": 1850.5
        },"trades":[]}"#;
        let response: OrderResponse = serde_json::from_str(json).unwrap();
        let state = OrderState::try_from(response.order).unwrap();
        assert_eq!(state.order_id, "ETH-349280");
        assert_eq!(state.side, Side::Sell);
        assert_eq!(state.status, OrderStatus::Open);
        assert_eq!(state.remaining(), dec!(30));
        assert_eq!(state.average_price, Some(dec!(1850.5)));
    }

    #[test]
    fn unfilled_order_has_no_average_price() {
        let json = r#"{"order_id":"1","instrument_name":"BTC-PERPETUAL","direction":"buy",
            "order_state":"cancelled","amount":100.0,"filled_amount":0.0,"average_price":0.0}"#;
        let order: Order = serde_json::from_str(json).unwrap();
        let state = OrderState::try_from(order).unwrap();
        assert_eq!(state.status, OrderStatus::Cancelled);
        assert!(state.average_price.is_none());
    }
}
