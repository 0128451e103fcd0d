use async_trait::async_trait;
use chrono::{Duration, Utc};
use delta_hedge_core::{
    BookTop, ExchangeGateway, GatewayError, OhlcvBar, OrderState, PerpetualPosition, Side, Symbol,
};
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::client::{DeribitClient, NOT_OPEN_ORDER};
use crate::models::{AccountSummary, ChartData, Order, OrderBook, OrderResponse, Position};

/// Live Deribit implementation of the exchange gateway.
pub struct DeribitGateway {
    client: Arc<DeribitClient>,
}

impl DeribitGateway {
    #[must_use]
    pub const fn new(client: Arc<DeribitClient>) -> Self {
        Self { client }
    }

    async fn place_order(
        &self,
        instrument: &str,
        side: Side,
        amount: Decimal,
        mut params: Vec<(&str, String)>,
    ) -> Result<OrderState, GatewayError> {
        if amount <= Decimal::ZERO {
            return Err(GatewayError::InvalidOrder(format!(
                "amount must be positive, got {amount}"
            )));
        }
        params.push(("instrument_name", instrument.to_string()));
        params.push(("amount", amount.normalize().to_string()));

        // The side doubles as the method name: private/buy or private/sell.
        let response: OrderResponse = self.client.private(&side.to_string(), &params).await?;
        OrderState::try_from(response.order)
    }
}

/// Currency prefix of an instrument name (`BTC-PERPETUAL` -> `BTC`).
fn currency_of(instrument: &str) -> &str {
    instrument.split('-').next().unwrap_or(instrument)
}

#[async_trait]
impl ExchangeGateway for DeribitGateway {
    async fn portfolio_delta(&self, symbol: Symbol) -> Result<Decimal, GatewayError> {
        let summary: AccountSummary = self
            .client
            .private(
                "get_account_summary",
                &[
                    ("currency", symbol.to_string()),
                    ("extended", "true".to_string()),
                ],
            )
            .await?;
        Ok(summary.delta_total)
    }

    async fn list_open_positions(
        &self,
        instrument: &str,
    ) -> Result<Vec<PerpetualPosition>, GatewayError> {
        let positions: Vec<Position> = self
            .client
            .private(
                "get_positions",
                &[
                    ("currency", currency_of(instrument).to_string()),
                    ("kind", "future".to_string()),
                ],
            )
            .await?;

        Ok(positions
            .into_iter()
            .filter(|p| p.instrument_name == instrument && !p.size.is_zero())
            .map(|p| PerpetualPosition {
                instrument: p.instrument_name,
                size: p.size,
            })
            .collect())
    }

    async fn recent_ohlcv(
        &self,
        instrument: &str,
        limit: usize,
    ) -> Result<Vec<OhlcvBar>, GatewayError> {
        let end = Utc::now();
        let minutes = i64::try_from(limit).unwrap_or(i64::MAX / 120_000) + 1;
        let start = end - Duration::minutes(minutes);

        let data: ChartData = self
            .client
            .public(
                "get_tradingview_chart_data",
                &[
                    ("instrument_name", instrument.to_string()),
                    ("start_timestamp", start.timestamp_millis().to_string()),
                    ("end_timestamp", end.timestamp_millis().to_string()),
                    ("resolution", "1".to_string()),
                ],
            )
            .await?;
        data.into_bars(limit)
    }

    async fn order_book_top(&self, instrument: &str) -> Result<BookTop, GatewayError> {
        let book: OrderBook = self
            .client
            .public(
                "get_order_book",
                &[
                    ("instrument_name", instrument.to_string()),
                    ("depth", "1".to_string()),
                ],
            )
            .await?;

        match (book.best_bid_price, book.best_ask_price) {
            (Some(best_bid), Some(best_ask)) if !best_bid.is_zero() && !best_ask.is_zero() => {
                Ok(BookTop { best_bid, best_ask })
            }
            _ => Err(GatewayError::missing(format!("{instrument}: empty top of book"))),
        }
    }

    async fn place_limit_order(
        &self,
        instrument: &str,
        side: Side,
        amount: Decimal,
        price: Decimal,
        post_only: bool,
    ) -> Result<OrderState, GatewayError> {
        let params = vec![
            ("type", "limit".to_string()),
            ("price", price.normalize().to_string()),
            ("post_only", post_only.to_string()),
        ];
        self.place_order(instrument, side, amount, params).await
    }

    async fn place_market_order(
        &self,
        instrument: &str,
        side: Side,
        amount: Decimal,
    ) -> Result<OrderState, GatewayError> {
        let params = vec![("type", "market".to_string())];
        self.place_order(instrument, side, amount, params).await
    }

    async fn order_status(&self, order_id: &str) -> Result<OrderState, GatewayError> {
        let order: Order = self
            .client
            .private("get_order_state", &[("order_id", order_id.to_string())])
            .await?;
        OrderState::try_from(order)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<OrderState, GatewayError> {
        let result: Result<Order, _> = self
            .client
            .private("cancel", &[("order_id", order_id.to_string())])
            .await;

        match result {
            Ok(order) => OrderState::try_from(order),
            // Filled or cancelled between our status check and the cancel.
            Err(GatewayError::Api { code: NOT_OPEN_ORDER, .. }) => {
                tracing::debug!(order_id, "Order no longer open, reading final state");
                self.order_status(order_id).await
            }
            Err(e) => Err(e),
        }
    }

    async fn cancel_all_open_orders(&self, instrument: &str) -> Result<u32, GatewayError> {
        let cancelled: u32 = self
            .client
            .private(
                "cancel_all_by_instrument",
                &[
                    ("instrument_name", instrument.to_string()),
                    ("type", "all".to_string()),
                ],
            )
            .await?;
        tracing::info!(instrument, cancelled, "Cancelled open orders");
        Ok(cancelled)
    }
}
