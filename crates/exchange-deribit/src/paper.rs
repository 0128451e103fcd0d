use async_trait::async_trait;
use delta_hedge_core::{
    BookTop, ExchangeGateway, GatewayError, OhlcvBar, OrderState, OrderStatus, PerpetualPosition,
    Side, Symbol,
};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::client::NOT_OPEN_ORDER;

/// Paper trading gateway for dry runs against live market data.
///
/// Reads (delta, positions, candles, book) go to the wrapped gateway. Writes
/// never reach the exchange: orders are kept in memory and filled against the
/// live top of book.
///
/// # Fill model
///
/// - Market orders fill immediately at the opposite side of the book.
/// - Post-only limit orders rest until a status check sees the book trade
///   through their price (ask at or below a buy, bid at or above a sell).
///
/// Simulated fills adjust the reported delta by `notional / fill price` and
/// the perpetual position by the notional, so the hedger sees its own trades.
pub struct PaperGateway<G> {
    inner: G,
    state: Arc<RwLock<PaperState>>,
}

#[derive(Debug, Default)]
struct PaperState {
    orders: HashMap<String, OrderState>,
    limit_prices: HashMap<String, Decimal>,
    /// Signed delta added by simulated fills, in asset units.
    delta_adjustment: Decimal,
    /// Signed perpetual notional added by simulated fills, per instrument.
    positions: HashMap<String, Decimal>,
}

impl PaperState {
    fn apply_fill(&mut self, order: &OrderState, quantity: Decimal, price: Decimal) {
        if quantity.is_zero() || price.is_zero() {
            return;
        }
        let signed = order.side.sign() * quantity;
        self.delta_adjustment += signed / price;
        *self.positions.entry(order.instrument.clone()).or_default() += signed;
    }
}

impl<G: ExchangeGateway> PaperGateway<G> {
    #[must_use]
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            state: Arc::new(RwLock::new(PaperState::default())),
        }
    }

    /// Number of simulated orders still resting.
    #[must_use]
    pub fn open_order_count(&self) -> usize {
        self.state
            .read()
            .orders
            .values()
            .filter(|o| o.status.is_open())
            .count()
    }

    fn validate(amount: Decimal) -> Result<(), GatewayError> {
        if amount <= Decimal::ZERO {
            return Err(GatewayError::InvalidOrder(format!(
                "amount must be positive, got {amount}"
            )));
        }
        Ok(())
    }

    fn lookup(&self, order_id: &str) -> Result<OrderState, GatewayError> {
        self.state
            .read()
            .orders
            .get(order_id)
            .cloned()
            .ok_or_else(|| not_found(order_id))
    }
}

fn not_found(order_id: &str) -> GatewayError {
    GatewayError::api(NOT_OPEN_ORDER, format!("paper order {order_id} not found"))
}

/// Whether a resting limit at `price` would have traded against `book`.
fn crosses(side: Side, price: Decimal, book: &BookTop) -> bool {
    match side {
        Side::Buy => book.best_ask <= price,
        Side::Sell => book.best_bid >= price,
    }
}

#[async_trait]
impl<G: ExchangeGateway> ExchangeGateway for PaperGateway<G> {
    async fn portfolio_delta(&self, symbol: Symbol) -> Result<Decimal, GatewayError> {
        let live = self.inner.portfolio_delta(symbol).await?;
        Ok(live + self.state.read().delta_adjustment)
    }

    async fn list_open_positions(
        &self,
        instrument: &str,
    ) -> Result<Vec<PerpetualPosition>, GatewayError> {
        let live = self.inner.list_open_positions(instrument).await?;
        let simulated = self
            .state
            .read()
            .positions
            .get(instrument)
            .copied()
            .unwrap_or_default();

        let size = live.iter().map(|p| p.size).sum::<Decimal>() + simulated;
        if size.is_zero() {
            return Ok(Vec::new());
        }
        Ok(vec![PerpetualPosition {
            instrument: instrument.to_string(),
            size,
        }])
    }

    async fn recent_ohlcv(
        &self,
        instrument: &str,
        limit: usize,
    ) -> Result<Vec<OhlcvBar>, GatewayError> {
        self.inner.recent_ohlcv(instrument, limit).await
    }

    async fn order_book_top(&self, instrument: &str) -> Result<BookTop, GatewayError> {
        self.inner.order_book_top(instrument).await
    }

    async fn place_limit_order(
        &self,
        instrument: &str,
        side: Side,
        amount: Decimal,
        price: Decimal,
        post_only: bool,
    ) -> Result<OrderState, GatewayError> {
        Self::validate(amount)?;

        let book = self.inner.order_book_top(instrument).await?;
        let status = if post_only && crosses(side, price, &book) {
            // Would take liquidity; the exchange rejects these.
            OrderStatus::Rejected
        } else {
            OrderStatus::Open
        };

        let order = OrderState {
            order_id: format!("paper-{}", Uuid::new_v4()),
            instrument: instrument.to_string(),
            side,
            status,
            amount,
            filled: Decimal::ZERO,
            average_price: None,
        };
        tracing::info!(
            order_id = %order.order_id,
            %side,
            %amount,
            %price,
            %status,
            "[PAPER] Limit order placed"
        );
        let mut state = self.state.write();
        state.limit_prices.insert(order.order_id.clone(), price);
        state.orders.insert(order.order_id.clone(), order.clone());
        Ok(order)
    }

    async fn place_market_order(
        &self,
        instrument: &str,
        side: Side,
        amount: Decimal,
    ) -> Result<OrderState, GatewayError> {
        Self::validate(amount)?;

        let book = self.inner.order_book_top(instrument).await?;
        let price = book.joining_price(side.opposite());

        let order = OrderState {
            order_id: format!("paper-{}", Uuid::new_v4()),
            instrument: instrument.to_string(),
            side,
            status: OrderStatus::Filled,
            amount,
            filled: amount,
            average_price: Some(price),
        };
        tracing::info!(
            order_id = %order.order_id,
            %side,
            %amount,
            %price,
            "[PAPER] Market order filled"
        );

        let mut state = self.state.write();
        state.apply_fill(&order, amount, price);
        state.orders.insert(order.order_id.clone(), order.clone());
        Ok(order)
    }

    async fn order_status(&self, order_id: &str) -> Result<OrderState, GatewayError> {
        let order = self.lookup(order_id)?;
        if order.status != OrderStatus::Open {
            return Ok(order);
        }

        let Some(limit) = self.state.read().limit_prices.get(order_id).copied() else {
            return Ok(order);
        };
        let book = self.inner.order_book_top(&order.instrument).await?;
        if !crosses(order.side, limit, &book) {
            return Ok(order);
        }

        let mut state = self.state.write();
        let Some(resting) = state.orders.get_mut(order_id) else {
            return Ok(order);
        };
        let quantity = resting.remaining();
        resting.filled = resting.amount;
        resting.status = OrderStatus::Filled;
        resting.average_price = Some(limit);
        let filled = resting.clone();
        state.apply_fill(&filled, quantity, limit);

        tracing::info!(order_id, price = %limit, "[PAPER] Limit order filled");
        Ok(filled)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<OrderState, GatewayError> {
        let mut state = self.state.write();
        let order = state
            .orders
            .get_mut(order_id)
            .ok_or_else(|| not_found(order_id))?;
        if order.status.is_open() {
            order.status = OrderStatus::Cancelled;
            tracing::info!(order_id, "[PAPER] Order cancelled");
        }
        Ok(order.clone())
    }

    async fn cancel_all_open_orders(&self, instrument: &str) -> Result<u32, GatewayError> {
        let mut state = self.state.write();
        let mut cancelled = 0;
        for order in state.orders.values_mut() {
            if order.instrument == instrument && order.status.is_open() {
                order.status = OrderStatus::Cancelled;
                cancelled += 1;
            }
        }
        tracing::info!(instrument, cancelled, "[PAPER] Cancelled open orders");
        Ok(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    /// Read-only market whose book can be moved between calls.
    struct StubMarket {
        book: RwLock<BookTop>,
        delta: Decimal,
    }

    impl StubMarket {
        fn new(bid: Decimal, ask: Decimal) -> Self {
            Self {
                book: RwLock::new(BookTop {
                    best_bid: bid,
                    best_ask: ask,
                }),
                delta: dec!(0.5),
            }
        }
    }

    #[async_trait]
    impl ExchangeGateway for StubMarket {
        async fn portfolio_delta(&self, _symbol: Symbol) -> Result<Decimal, GatewayError> {
            Ok(self.delta)
        }

        async fn list_open_positions(
            &self,
            _instrument: &str,
        ) -> Result<Vec<PerpetualPosition>, GatewayError> {
            Ok(Vec::new())
        }

        async fn recent_ohlcv(
            &self,
            _instrument: &str,
            _limit: usize,
        ) -> Result<Vec<OhlcvBar>, GatewayError> {
            Ok(vec![OhlcvBar {
                timestamp: Utc::now(),
                open: dec!(1),
                high: dec!(1),
                low: dec!(1),
                close: dec!(1),
                volume: dec!(1),
            }])
        }

        async fn order_book_top(&self, _instrument: &str) -> Result<BookTop, GatewayError> {
            Ok(*self.book.read())
        }

        async fn place_limit_order(
            &self,
            _instrument: &str,
            _side: Side,
            _amount: Decimal,
            _price: Decimal,
            _post_only: bool,
        ) -> Result<OrderState, GatewayError> {
            panic!("paper gateway must not place live orders")
        }

        async fn place_market_order(
            &self,
            _instrument: &str,
            _side: Side,
            _amount: Decimal,
        ) -> Result<OrderState, GatewayError> {
            panic!("paper gateway must not place live orders")
        }

        async fn order_status(&self, _order_id: &str) -> Result<OrderState, GatewayError> {
            panic!("paper gateway must not query live orders")
        }

        async fn cancel_order(&self, _order_id: &str) -> Result<OrderState, GatewayError> {
            panic!("paper gateway must not cancel live orders")
        }

        async fn cancel_all_open_orders(&self, _instrument: &str) -> Result<u32, GatewayError> {
            panic!("paper gateway must not cancel live orders")
        }
    }

    const PERP: &str = "BTC-PERPETUAL";

    #[tokio::test]
    async fn market_order_fills_at_far_side_and_moves_delta() {
        let paper = PaperGateway::new(StubMarket::new(dec!(30000), dec!(30010)));

        let order = paper
            .place_market_order(PERP, Side::Sell, dec!(15000))
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.average_price, Some(dec!(30000)));

        // 0.5 - 15000 / 30000
        let delta = paper.portfolio_delta(Symbol::Btc).await.unwrap();
        assert_eq!(delta, dec!(0));
        assert_eq!(
            paper.perpetual_position_size(Symbol::Btc).await.unwrap(),
            dec!(-15000)
        );
    }

    #[tokio::test]
    async fn resting_limit_fills_once_book_trades_through() {
        let market = StubMarket::new(dec!(30000), dec!(30010));
        let paper = PaperGateway::new(market);

        let order = paper
            .place_limit_order(PERP, Side::Buy, dec!(100), dec!(30000), true)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Open);
        assert_eq!(paper.open_order_count(), 1);

        let still_open = paper.order_status(&order.order_id).await.unwrap();
        assert_eq!(still_open.status, OrderStatus::Open);

        *paper.inner.book.write() = BookTop {
            best_bid: dec!(29990),
            best_ask: dec!(29995),
        };
        let filled = paper.order_status(&order.order_id).await.unwrap();
        assert_eq!(filled.status, OrderStatus::Filled);
        assert!(filled.is_fully_filled());
        assert_eq!(paper.open_order_count(), 0);
    }

    #[tokio::test]
    async fn crossing_post_only_is_rejected() {
        let paper = PaperGateway::new(StubMarket::new(dec!(30000), dec!(30010)));
        let order = paper
            .place_limit_order(PERP, Side::Buy, dec!(100), dec!(30010), true)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Rejected);
    }

    #[tokio::test]
    async fn cancel_all_only_touches_open_orders() {
        let paper = PaperGateway::new(StubMarket::new(dec!(30000), dec!(30010)));
        let resting = paper
            .place_limit_order(PERP, Side::Sell, dec!(50), dec!(30010), true)
            .await
            .unwrap();
        paper
            .place_market_order(PERP, Side::Buy, dec!(10))
            .await
            .unwrap();

        assert_eq!(paper.cancel_all_open_orders(PERP).await.unwrap(), 1);
        let state = paper.cancel_order(&resting.order_id).await.unwrap();
        assert_eq!(state.status, OrderStatus::Cancelled);
        assert_eq!(paper.cancel_all_open_orders(PERP).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn zero_amount_is_invalid() {
        let paper = PaperGateway::new(StubMarket::new(dec!(1), dec!(2)));
        let err = paper
            .place_market_order(PERP, Side::Buy, dec!(0))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidOrder(_)));
    }
}
