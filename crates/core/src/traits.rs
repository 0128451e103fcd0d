use crate::error::GatewayError;
use crate::types::{BookTop, OhlcvBar, OrderState, PerpetualPosition, Side, Symbol};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::time::Duration;

/// Account, market data and order primitives of the exchange.
///
/// Implementations handle authentication, rate limiting and transport retries.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Signed net delta of the account in `symbol`, in units of the asset.
    async fn portfolio_delta(&self, symbol: Symbol) -> Result<Decimal, GatewayError>;

    async fn list_open_positions(
        &self,
        instrument: &str,
    ) -> Result<Vec<PerpetualPosition>, GatewayError>;

    /// Signed size of the open perpetual position, zero if there is none.
    async fn perpetual_position_size(&self, symbol: Symbol) -> Result<Decimal, GatewayError> {
        let positions = self.list_open_positions(&symbol.perpetual()).await?;
        Ok(positions.first().map_or(Decimal::ZERO, |p| p.size))
    }

    /// Most recent 1-minute bars, oldest first.
    async fn recent_ohlcv(
        &self,
        instrument: &str,
        limit: usize,
    ) -> Result<Vec<OhlcvBar>, GatewayError>;

    async fn order_book_top(&self, instrument: &str) -> Result<BookTop, GatewayError>;

    async fn place_limit_order(
        &self,
        instrument: &str,
        side: Side,
        amount: Decimal,
        price: Decimal,
        post_only: bool,
    ) -> Result<OrderState, GatewayError>;

    async fn place_market_order(
        &self,
        instrument: &str,
        side: Side,
        amount: Decimal,
    ) -> Result<OrderState, GatewayError>;

    async fn order_status(&self, order_id: &str) -> Result<OrderState, GatewayError>;

    /// Cancels one order and returns its final state.
    async fn cancel_order(&self, order_id: &str) -> Result<OrderState, GatewayError>;

    /// Cancels every open order on `instrument`, returning how many were cancelled.
    async fn cancel_all_open_orders(&self, instrument: &str) -> Result<u32, GatewayError>;
}

#[async_trait]
pub trait IndexPriceSource: Send + Sync {
    async fn index_price(&self, symbol: Symbol) -> Result<Decimal, GatewayError>;
}

/// Best-effort human alerts. Implementations log their own delivery failures.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str);
}

/// Monotonic time and suspension, injectable so timing logic runs without real delays.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock's own epoch.
    fn now(&self) -> Duration;

    async fn sleep(&self, duration: Duration);
}
