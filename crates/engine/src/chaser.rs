//! Maker-first order execution.
//!
//! A hedge is worked as a post-only limit order joining the top of book. After
//! each dwell the order is checked: a full fill ends the chase, otherwise the
//! order is cancelled and re-quoted at the new top of book. Once the chase has
//! run for the timeout, the unfilled remainder goes out as a market order.
//!
//! ```text
//! Quoting --place limit--> Waiting --filled--------------------> Done
//!    ^                        |--cancel, elapsed >= timeout, market --> Done
//!    +------cancel------------+
//! ```
//!
//! A zero timeout skips quoting and sends one market order.

use std::time::Duration;

use delta_hedge_core::{Clock, ExchangeGateway, GatewayError, ScheduleConfig, Side};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::types::{ChaseReport, HedgeOrderIntent};

/// Dwell and escalation timing of a chase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChasePolicy {
    pub dwell: Duration,
    pub timeout: Duration,
}

impl ChasePolicy {
    #[must_use]
    pub const fn from_schedule(schedule: &ScheduleConfig) -> Self {
        Self {
            dwell: schedule.dwell(),
            timeout: schedule.chase_timeout(),
        }
    }

    /// Single market order, no quoting.
    #[must_use]
    pub const fn is_immediate(&self) -> bool {
        self.timeout.is_zero()
    }
}

impl Default for ChasePolicy {
    fn default() -> Self {
        Self::from_schedule(&ScheduleConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChasePhase {
    Quoting,
    Waiting { order_id: String },
    Done,
}

/// State of one hedge trade while it is being worked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChaseOrder {
    pub instrument: String,
    pub side: Side,
    pub requested: Decimal,
    pub remaining: Decimal,
    /// Clock reading when the chase began.
    pub started_at: Duration,
    pub phase: ChasePhase,
    pub limit_orders: u32,
    pub passive_filled: Decimal,
    pub market_filled: Decimal,
    pub escalated: bool,
}

impl ChaseOrder {
    #[must_use]
    pub fn start(instrument: impl Into<String>, intent: HedgeOrderIntent, now: Duration) -> Self {
        Self {
            instrument: instrument.into(),
            side: intent.side,
            requested: intent.notional,
            remaining: intent.notional,
            started_at: now,
            phase: ChasePhase::Quoting,
            limit_orders: 0,
            passive_filled: Decimal::ZERO,
            market_filled: Decimal::ZERO,
            escalated: false,
        }
    }

    /// Id of the resting limit order, if one is live.
    #[must_use]
    pub fn current_order_id(&self) -> Option<&str> {
        match &self.phase {
            ChasePhase::Waiting { order_id } => Some(order_id),
            ChasePhase::Quoting | ChasePhase::Done => None,
        }
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.phase == ChasePhase::Done
    }

    #[must_use]
    pub fn report(&self, now: Duration) -> ChaseReport {
        ChaseReport {
            side: self.side,
            requested: self.requested,
            limit_orders: self.limit_orders,
            passive_filled: self.passive_filled,
            market_filled: self.market_filled,
            escalated: self.escalated,
            elapsed: now.saturating_sub(self.started_at),
        }
    }
}

/// Drives a [`ChaseOrder`] against the exchange.
pub struct OrderChaser<'a> {
    gateway: &'a dyn ExchangeGateway,
    clock: &'a dyn Clock,
    policy: ChasePolicy,
}

impl<'a> OrderChaser<'a> {
    #[must_use]
    pub fn new(
        gateway: &'a dyn ExchangeGateway,
        clock: &'a dyn Clock,
        policy: ChasePolicy,
    ) -> Self {
        Self {
            gateway,
            clock,
            policy,
        }
    }

    /// Works `intent` on `instrument` until filled or escalated.
    ///
    /// If a step fails while a limit order is resting, that order is
    /// cancelled before the error is returned.
    ///
    /// # Errors
    /// Returns the first gateway error encountered
    pub async fn execute(
        &self,
        instrument: &str,
        intent: HedgeOrderIntent,
    ) -> Result<ChaseReport, GatewayError> {
        info!(
            instrument,
            side = %intent.side,
            notional = %intent.notional,
            timeout_secs = self.policy.timeout.as_secs(),
            "Starting hedge execution"
        );

        let mut order = ChaseOrder::start(instrument, intent, self.clock.now());
        while !order.is_done() {
            let resting = order.current_order_id().map(str::to_owned);
            order = match self.step(order).await {
                Ok(next) => next,
                Err(e) => {
                    if let Some(order_id) = resting {
                        self.abandon(&order_id).await;
                    }
                    return Err(e);
                }
            };
        }

        let report = order.report(self.clock.now());
        info!(
            side = %report.side,
            requested = %report.requested,
            passive = %report.passive_filled,
            market = %report.market_filled,
            limit_orders = report.limit_orders,
            escalated = report.escalated,
            elapsed_secs = report.elapsed.as_secs(),
            "Hedge execution complete"
        );
        Ok(report)
    }

    /// Advances the chase by one transition.
    ///
    /// # Errors
    /// Returns error if any exchange call fails
    pub async fn step(&self, mut order: ChaseOrder) -> Result<ChaseOrder, GatewayError> {
        match order.phase.clone() {
            ChasePhase::Quoting if self.policy.is_immediate() => self.escalate(order).await,
            ChasePhase::Quoting => {
                let book = self.gateway.order_book_top(&order.instrument).await?;
                let price = book.joining_price(order.side);
                let placed = self
                    .gateway
                    .place_limit_order(&order.instrument, order.side, order.remaining, price, true)
                    .await?;
                order.limit_orders += 1;
                debug!(
                    order_id = %placed.order_id,
                    side = %order.side,
                    amount = %order.remaining,
                    %price,
                    status = %placed.status,
                    "Limit order placed"
                );
                order.phase = ChasePhase::Waiting {
                    order_id: placed.order_id,
                };
                Ok(order)
            }
            ChasePhase::Waiting { order_id } => {
                self.clock.sleep(self.policy.dwell).await;

                let status = self.gateway.order_status(&order_id).await?;
                if status.is_fully_filled() {
                    order.passive_filled += status.filled;
                    order.remaining = Decimal::ZERO;
                    order.phase = ChasePhase::Done;
                    debug!(%order_id, "Limit order filled");
                    return Ok(order);
                }

                let last = if status.status.is_open() {
                    self.gateway.cancel_order(&order_id).await?
                } else {
                    debug!(%order_id, status = %status.status, "Order closed by exchange");
                    status
                };
                order.passive_filled += last.filled;
                order.remaining = last.remaining();

                if order.remaining.is_zero() {
                    order.phase = ChasePhase::Done;
                    return Ok(order);
                }

                let elapsed = self.clock.now().saturating_sub(order.started_at);
                if elapsed >= self.policy.timeout {
                    info!(
                        elapsed_secs = elapsed.as_secs(),
                        remaining = %order.remaining,
                        "Chase timed out, escalating to market"
                    );
                    return self.escalate(order).await;
                }

                debug!(remaining = %order.remaining, "Re-quoting");
                order.phase = ChasePhase::Quoting;
                Ok(order)
            }
            ChasePhase::Done => Ok(order),
        }
    }

    async fn escalate(&self, mut order: ChaseOrder) -> Result<ChaseOrder, GatewayError> {
        let filled = self
            .gateway
            .place_market_order(&order.instrument, order.side, order.remaining)
            .await?;
        order.market_filled += filled.filled;
        order.remaining = filled.remaining();
        order.escalated = true;
        order.phase = ChasePhase::Done;
        Ok(order)
    }

    async fn abandon(&self, order_id: &str) {
        match self.gateway.cancel_order(order_id).await {
            Ok(_) => warn!(order_id, "Cancelled resting order after failed chase step"),
            Err(e) => warn!(order_id, error = %e, "Failed to cancel resting order"),
        }
    }
}
