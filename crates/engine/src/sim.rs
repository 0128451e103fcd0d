//! Scripted collaborators for driving the hedger without an exchange.
//!
//! Every type is cheap to clone and clones share state, so a test can hand one
//! copy to the service and keep another to script inputs and inspect calls.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use delta_hedge_core::{
    BookTop, Clock, ExchangeGateway, GatewayError, IndexPriceSource, Notifier, OhlcvBar,
    OrderState, OrderStatus, PerpetualPosition, Side, Symbol,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::sync::oneshot;

/// One recorded gateway interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    IndexPrice,
    PortfolioDelta,
    ListPositions,
    RecentOhlcv,
    OrderBookTop,
    PlaceLimit {
        side: Side,
        amount: Decimal,
        price: Decimal,
        post_only: bool,
    },
    PlaceMarket {
        side: Side,
        amount: Decimal,
    },
    OrderStatus(String),
    Cancel(String),
    CancelAll(String),
}

/// How a resting limit order fills by its first status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitFill {
    Unfilled,
    Partial(Decimal),
    Full,
    /// The exchange cancelled it before the check.
    ExternallyCancelled,
}

#[derive(Debug)]
struct ScriptState {
    index_price: Decimal,
    delta: Decimal,
    position: Decimal,
    book: BookTop,
    bars: Vec<OhlcvBar>,
    limit_fills: VecDeque<LimitFill>,
    pending_fills: HashMap<String, LimitFill>,
    orders: HashMap<String, OrderState>,
    failures: HashMap<&'static str, VecDeque<GatewayError>>,
    calls: Vec<GatewayCall>,
    next_id: u64,
    on_limit_order: Option<oneshot::Sender<()>>,
}

/// In-memory exchange and index source with scripted responses.
#[derive(Debug, Clone)]
pub struct ScriptedGateway {
    state: Arc<Mutex<ScriptState>>,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedGateway {
    #[must_use]
    pub fn new() -> Self {
        let state = ScriptState {
            index_price: Decimal::ZERO,
            delta: Decimal::ZERO,
            position: Decimal::ZERO,
            book: BookTop {
                best_bid: Decimal::from(30_000),
                best_ask: Decimal::new(300_005, 1),
            },
            bars: Vec::new(),
            limit_fills: VecDeque::new(),
            pending_fills: HashMap::new(),
            orders: HashMap::new(),
            failures: HashMap::new(),
            calls: Vec::new(),
            next_id: 1,
            on_limit_order: None,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn set_index_price(&self, price: Decimal) {
        self.state.lock().index_price = price;
    }

    pub fn set_delta(&self, delta: Decimal) {
        self.state.lock().delta = delta;
    }

    pub fn set_position(&self, size: Decimal) {
        self.state.lock().position = size;
    }

    pub fn set_book(&self, best_bid: Decimal, best_ask: Decimal) {
        self.state.lock().book = BookTop { best_bid, best_ask };
    }

    /// Latest 1-minute bar with every price at `price`.
    pub fn set_flat_bar(&self, price: Decimal) {
        self.set_bars(vec![OhlcvBar {
            timestamp: Utc::now(),
            open: price,
            high: price,
            low: price,
            close: price,
            volume: Decimal::ONE,
        }]);
    }

    pub fn set_bars(&self, bars: Vec<OhlcvBar>) {
        self.state.lock().bars = bars;
    }

    /// Fill behaviour of the next limit orders, in placement order.
    /// Orders beyond the script stay unfilled.
    pub fn script_limit_fills(&self, fills: impl IntoIterator<Item = LimitFill>) {
        self.state.lock().limit_fills.extend(fills);
    }

    /// Makes the next call of `method` fail with `error`.
    pub fn fail_next(&self, method: &'static str, error: GatewayError) {
        self.state
            .lock()
            .failures
            .entry(method)
            .or_default()
            .push_back(error);
    }

    /// Resolves when the next limit order is placed.
    #[must_use]
    pub fn on_next_limit_order(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.state.lock().on_limit_order = Some(tx);
        rx
    }

    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state.lock().calls.clone()
    }

    #[must_use]
    pub fn count(&self, matches: impl Fn(&GatewayCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| matches(c)).count()
    }

    #[must_use]
    pub fn limit_orders(&self) -> usize {
        self.count(|c| matches!(c, GatewayCall::PlaceLimit { .. }))
    }

    #[must_use]
    pub fn market_orders(&self) -> Vec<(Side, Decimal)> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                GatewayCall::PlaceMarket { side, amount } => Some((*side, *amount)),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn cancels(&self) -> usize {
        self.count(|c| matches!(c, GatewayCall::Cancel(_)))
    }

    #[must_use]
    pub fn cancel_alls(&self) -> usize {
        self.count(|c| matches!(c, GatewayCall::CancelAll(_)))
    }

    /// Orders still open on the simulated book.
    #[must_use]
    pub fn open_orders(&self) -> usize {
        self.state
            .lock()
            .orders
            .values()
            .filter(|o| o.status.is_open())
            .count()
    }

    fn enter(&self, method: &'static str, call: GatewayCall) -> Result<(), GatewayError> {
        let mut state = self.state.lock();
        state.calls.push(call);
        match state.failures.get_mut(method).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn unknown(order_id: &str) -> GatewayError {
        GatewayError::api(11044, format!("order {order_id} not found"))
    }
}

#[async_trait]
impl ExchangeGateway for ScriptedGateway {
    async fn portfolio_delta(&self, _symbol: Symbol) -> Result<Decimal, GatewayError> {
        self.enter("portfolio_delta", GatewayCall::PortfolioDelta)?;
        Ok(self.state.lock().delta)
    }

    async fn list_open_positions(
        &self,
        instrument: &str,
    ) -> Result<Vec<PerpetualPosition>, GatewayError> {
        self.enter("list_open_positions", GatewayCall::ListPositions)?;
        let size = self.state.lock().position;
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
        _instrument: &str,
        limit: usize,
    ) -> Result<Vec<OhlcvBar>, GatewayError> {
        self.enter("recent_ohlcv", GatewayCall::RecentOhlcv)?;
        let state = self.state.lock();
        let skip = state.bars.len().saturating_sub(limit);
        Ok(state.bars[skip..].to_vec())
    }

    async fn order_book_top(&self, _instrument: &str) -> Result<BookTop, GatewayError> {
        self.enter("order_book_top", GatewayCall::OrderBookTop)?;
        Ok(self.state.lock().book)
    }

    async fn place_limit_order(
        &self,
        instrument: &str,
        side: Side,
        amount: Decimal,
        price: Decimal,
        post_only: bool,
    ) -> Result<OrderState, GatewayError> {
        self.enter(
            "place_limit_order",
            GatewayCall::PlaceLimit {
                side,
                amount,
                price,
                post_only,
            },
        )?;

        let mut state = self.state.lock();
        let order_id = format!("sim-{}", state.next_id);
        state.next_id += 1;

        let order = OrderState {
            order_id: order_id.clone(),
            instrument: instrument.to_string(),
            side,
            status: OrderStatus::Open,
            amount,
            filled: Decimal::ZERO,
            average_price: None,
        };
        let fill = state.limit_fills.pop_front().unwrap_or(LimitFill::Unfilled);
        state.pending_fills.insert(order_id.clone(), fill);
        state.orders.insert(order_id, order.clone());

        if let Some(tx) = state.on_limit_order.take() {
            let _ = tx.send(());
        }
        Ok(order)
    }

    async fn place_market_order(
        &self,
        instrument: &str,
        side: Side,
        amount: Decimal,
    ) -> Result<OrderState, GatewayError> {
        self.enter("place_market_order", GatewayCall::PlaceMarket { side, amount })?;

        let mut state = self.state.lock();
        let order_id = format!("sim-{}", state.next_id);
        state.next_id += 1;
        let price = state.book.joining_price(side.opposite());

        let order = OrderState {
            order_id: order_id.clone(),
            instrument: instrument.to_string(),
            side,
            status: OrderStatus::Filled,
            amount,
            filled: amount,
            average_price: Some(price),
        };
        state.orders.insert(order_id, order.clone());
        Ok(order)
    }

    async fn order_status(&self, order_id: &str) -> Result<OrderState, GatewayError> {
        self.enter("order_status", GatewayCall::OrderStatus(order_id.to_string()))?;

        let mut state = self.state.lock();
        let fill = state.pending_fills.remove(order_id);
        let order = state
            .orders
            .get_mut(order_id)
            .ok_or_else(|| Self::unknown(order_id))?;

        match fill {
            Some(LimitFill::Full) => {
                order.filled = order.amount;
                order.status = OrderStatus::Filled;
            }
            Some(LimitFill::Partial(quantity)) => {
                order.filled = quantity.min(order.amount);
                if order.is_fully_filled() {
                    order.status = OrderStatus::Filled;
                }
            }
            Some(LimitFill::ExternallyCancelled) => order.status = OrderStatus::Cancelled,
            Some(LimitFill::Unfilled) | None => {}
        }
        Ok(order.clone())
    }

    async fn cancel_order(&self, order_id: &str) -> Result<OrderState, GatewayError> {
        self.enter("cancel_order", GatewayCall::Cancel(order_id.to_string()))?;

        let mut state = self.state.lock();
        let order = state
            .orders
            .get_mut(order_id)
            .ok_or_else(|| Self::unknown(order_id))?;
        if order.status.is_open() {
            order.status = OrderStatus::Cancelled;
        }
        Ok(order.clone())
    }

    async fn cancel_all_open_orders(&self, instrument: &str) -> Result<u32, GatewayError> {
        self.enter(
            "cancel_all_open_orders",
            GatewayCall::CancelAll(instrument.to_string()),
        )?;

        let mut state = self.state.lock();
        let mut cancelled = 0;
        for order in state.orders.values_mut() {
            if order.instrument == instrument && order.status.is_open() {
                order.status = OrderStatus::Cancelled;
                cancelled += 1;
            }
        }
        Ok(cancelled)
    }
}

#[async_trait]
impl IndexPriceSource for ScriptedGateway {
    async fn index_price(&self, _symbol: Symbol) -> Result<Decimal, GatewayError> {
        self.enter("index_price", GatewayCall::IndexPrice)?;
        Ok(self.state.lock().index_price)
    }
}

/// Virtual time. Sleeping advances the clock instantly and yields once so
/// that racing futures get polled.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<Duration>>,
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    /// Every sleep requested so far.
    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}

/// Keeps every alert in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    messages: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}
