//! Run loop: one cycle per poll, adaptive sleep between cycles.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use delta_hedge_core::{
    Clock, ErrorKind, ExchangeGateway, HedgeConfig, IndexPriceSource, Notifier, ScheduleConfig,
};
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::bands::BandMonitor;
use crate::chaser::{ChasePolicy, OrderChaser};
use crate::decision::{average_price, decide, plan_hedge, round_to_contract};
use crate::error::HedgeError;
use crate::types::{ChaseReport, CycleOutcome, Decision, HedgeOrderIntent, HedgeRuntimeState};

/// Collaborators the service runs against.
pub struct HedgeDeps {
    pub gateway: Arc<dyn ExchangeGateway>,
    pub index: Arc<dyn IndexPriceSource>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

/// Delta hedging service for one asset.
pub struct HedgeService {
    gateway: Arc<dyn ExchangeGateway>,
    index: Arc<dyn IndexPriceSource>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: HedgeConfig,
    schedule: ScheduleConfig,
    bands: BandMonitor,
    instrument: String,
}

impl HedgeService {
    #[must_use]
    pub fn new(config: HedgeConfig, schedule: ScheduleConfig, deps: HedgeDeps) -> Self {
        Self {
            gateway: deps.gateway,
            index: deps.index,
            notifier: deps.notifier,
            clock: deps.clock,
            bands: BandMonitor::new(&config),
            instrument: config.symbol.perpetual(),
            config,
            schedule,
        }
    }

    #[must_use]
    pub const fn bands(&self) -> &BandMonitor {
        &self.bands
    }

    #[must_use]
    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    /// State for a fresh process. `resume_hedged` carries over a hedge made
    /// before a restart.
    #[must_use]
    pub const fn initial_state(&self, resume_hedged: bool) -> HedgeRuntimeState {
        HedgeRuntimeState::new(resume_hedged, self.schedule.fast_interval())
    }

    // ========================================================================
    // Loop
    // ========================================================================

    /// Runs cycles until `shutdown` resolves or a fatal error occurs.
    ///
    /// Shutdown drops any in-flight cycle, including a resting chase order,
    /// then cancels all open orders on the perpetual once.
    ///
    /// # Errors
    /// Returns the cause of a fatal cycle, after open orders were cancelled
    pub async fn run(
        &self,
        state: HedgeRuntimeState,
        shutdown: impl Future<Output = ()>,
    ) -> Result<HedgeRuntimeState, HedgeError> {
        tokio::pin!(shutdown);
        let mut state = state;

        info!(
            symbol = %self.config.symbol,
            threshold = %self.config.threshold,
            strike = %self.config.strike,
            price_change_percent = %self.config.price_change_percent,
            num_levels = ?self.config.num_levels,
            hedged_once = state.hedged_once,
            "Delta hedger started"
        );

        loop {
            let (next, outcome) = tokio::select! {
                biased;
                () = &mut shutdown => return self.stop(state).await,
                result = self.run_cycle(state.clone()) => result,
            };
            state = next;

            let delay = match outcome {
                CycleOutcome::Continue { next_delay } => next_delay,
                CycleOutcome::Fatal { cause } => {
                    self.cancel_open_orders().await;
                    return Err(cause);
                }
            };

            tokio::select! {
                biased;
                () = &mut shutdown => return self.stop(state).await,
                () = self.clock.sleep(delay) => {}
            }
        }
    }

    /// One poll: read index and position, run the triggered checks, choose
    /// the next sleep. Errors are classified here; the returned state keeps
    /// any hedge executed before the error.
    pub async fn run_cycle(
        &self,
        mut state: HedgeRuntimeState,
    ) -> (HedgeRuntimeState, CycleOutcome) {
        state.cycles += 1;
        match self.cycle(&mut state).await {
            Ok(next_delay) => {
                state.interval = next_delay;
                (state, CycleOutcome::Continue { next_delay })
            }
            Err(e) => {
                let outcome = self.on_error(e).await;
                (state, outcome)
            }
        }
    }

    async fn cycle(&self, state: &mut HedgeRuntimeState) -> Result<Duration, HedgeError> {
        let symbol = self.config.symbol;
        let index_price = self.index.index_price(symbol).await?;
        let position = self.gateway.perpetual_position_size(symbol).await?;
        info!(%index_price, perps_size = %position, "Cycle {}", state.cycles);

        for trigger in self.bands.evaluate(index_price, position) {
            info!(%trigger, "Delta hedge check triggered");
            if self.hedge().await?.is_some() {
                state.record_hedge();
            }
        }

        let upper = self.bands.band(1).price;
        let lower = self.bands.band(-1).price;
        let interval = self.next_interval(state.hedged_once, position);
        info!(
            upper_level = %upper,
            lower_level = %lower,
            hedged_once = state.hedged_once,
            sleep_secs = interval.as_secs(),
            "Cycle complete"
        );
        Ok(interval)
    }

    /// Long interval once a hedge is on; short while waiting for a breach.
    #[must_use]
    pub fn next_interval(&self, hedged_once: bool, position: Decimal) -> Duration {
        if hedged_once && !position.is_zero() {
            self.schedule.slow_interval()
        } else {
            self.schedule.fast_interval()
        }
    }

    // ========================================================================
    // Hedging
    // ========================================================================

    /// Current portfolio delta for the configured asset.
    ///
    /// # Errors
    /// Returns error if the gateway call fails
    pub async fn current_delta(&self) -> Result<Decimal, HedgeError> {
        Ok(self.gateway.portfolio_delta(self.config.symbol).await?)
    }

    /// Re-reads delta and, if it is outside tolerance, works an offsetting
    /// order on the perpetual. Returns `None` when nothing was traded.
    ///
    /// # Errors
    /// Returns error if a read or order call fails
    pub async fn hedge(&self) -> Result<Option<ChaseReport>, HedgeError> {
        let delta = self.current_delta().await?;
        info!(%delta, "Current delta");

        if decide(delta, self.config.threshold).is_none() {
            info!(%delta, "No need to hedge");
            return Ok(None);
        }

        let bars = self
            .gateway
            .recent_ohlcv(&self.instrument, self.schedule.ohlcv_limit)
            .await?;
        let avg_price =
            average_price(&bars).ok_or_else(|| HedgeError::NoPriceData(self.instrument.clone()))?;

        let Decision::Hedge(intent) = plan_hedge(delta, self.config.threshold, avg_price) else {
            return Ok(None);
        };

        let notional = round_to_contract(intent.notional, self.config.symbol.contract_size());
        if notional.is_zero() {
            info!(
                %delta,
                raw_notional = %intent.notional,
                "Hedge smaller than one contract, skipping"
            );
            return Ok(None);
        }

        let intent = HedgeOrderIntent { notional, ..intent };
        let chaser = OrderChaser::new(
            self.gateway.as_ref(),
            self.clock.as_ref(),
            ChasePolicy::from_schedule(&self.schedule),
        );
        let report = chaser.execute(&self.instrument, intent).await?;

        info!(
            side = %report.side,
            size = %(notional / avg_price).round_dp(6),
            symbol = %self.config.symbol,
            "Rebalancing trade to achieve delta-neutral portfolio"
        );
        self.notifier
            .notify(&format!(
                "Delta hedge on {}: {} {} USD at ~{} (delta was {}){}",
                self.instrument,
                report.side,
                report.total_filled(),
                avg_price.round_dp(2),
                delta,
                if report.escalated {
                    ", remainder filled at market"
                } else {
                    ""
                }
            ))
            .await;

        Ok(Some(report))
    }

    /// Cancels every open order on the perpetual.
    ///
    /// # Errors
    /// Returns error if the gateway call fails
    pub async fn cancel_all(&self) -> Result<u32, HedgeError> {
        Ok(self.gateway.cancel_all_open_orders(&self.instrument).await?)
    }

    // ========================================================================
    // Failure and shutdown
    // ========================================================================

    async fn on_error(&self, e: HedgeError) -> CycleOutcome {
        match e.kind() {
            ErrorKind::Transient => {
                let backoff = self.schedule.error_backoff();
                let delta = self.gateway.portfolio_delta(self.config.symbol).await.ok();
                error!(
                    error = %e,
                    delta = ?delta,
                    retry_secs = backoff.as_secs(),
                    "Script is broken, trying again"
                );
                let delta = delta.map_or_else(|| "unavailable".to_string(), |d| d.to_string());
                self.notifier
                    .notify(&format!(
                        "Delta hedger error: {e}. Retrying in {}s. Current portfolio delta: {delta}",
                        backoff.as_secs()
                    ))
                    .await;
                CycleOutcome::Continue {
                    next_delay: backoff,
                }
            }
            ErrorKind::Fatal | ErrorKind::Interrupted => {
                error!(error = %e, "Fatal error, stopping delta hedger");
                self.notifier
                    .notify(&format!("Delta hedger stopped on fatal error: {e}"))
                    .await;
                CycleOutcome::Fatal { cause: e }
            }
        }
    }

    async fn stop(&self, state: HedgeRuntimeState) -> Result<HedgeRuntimeState, HedgeError> {
        let reason = HedgeError::Interrupted;
        info!(kind = ?reason.kind(), "Shutdown requested, cancelling open orders");
        self.cancel_open_orders().await;
        self.notifier
            .notify(&format!(
                "Delta hedger stopped by operator after {} cycles and {} hedges",
                state.cycles, state.hedges
            ))
            .await;
        Ok(state)
    }

    async fn cancel_open_orders(&self) {
        match self.cancel_all().await {
            Ok(cancelled) => info!(instrument = %self.instrument, cancelled, "Open orders cancelled"),
            Err(e) => warn!(instrument = %self.instrument, error = %e, "Failed to cancel open orders"),
        }
    }
}
