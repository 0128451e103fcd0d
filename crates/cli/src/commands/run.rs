//! Continuous delta hedging until Ctrl+C.

use std::sync::Arc;

use anyhow::{ensure, Result};
use clap::Args;
use delta_hedge_core::ExchangeGateway;
use delta_hedge_deribit::{DeribitGateway, DeribitIndexSource, PaperGateway};
use delta_hedge_engine::{notifier, HedgeDeps, HedgeService, TokioClock};
use tracing::{error, info, warn};

use super::{deribit_client, ConfigArgs};

/// Arguments for the run command.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Simulate orders against live market data instead of trading
    #[arg(long)]
    pub paper: bool,

    /// Start as if the first hedge was already executed
    #[arg(long)]
    pub resume_hedged: bool,
}

pub async fn run_hedger(args: RunArgs) -> Result<()> {
    let config = args.config.load()?;
    let resume_hedged = args.resume_hedged || config.resume_hedged;

    let client = deribit_client(&config)?;
    ensure!(
        client.has_credentials(),
        "Deribit client_id and client_secret are required (set HEDGE_DERIBIT__CLIENT_ID and HEDGE_DERIBIT__CLIENT_SECRET)"
    );

    let live = DeribitGateway::new(client.clone());
    let gateway: Arc<dyn ExchangeGateway> = if args.paper {
        warn!("PAPER MODE: orders are simulated, nothing is sent to the exchange");
        Arc::new(PaperGateway::new(live))
    } else {
        Arc::new(live)
    };

    if config.telegram.is_none() {
        info!("No Telegram credentials configured, alerts go to the log");
    }

    let service = HedgeService::new(
        config.hedge.clone(),
        config.schedule.clone(),
        HedgeDeps {
            gateway,
            index: Arc::new(DeribitIndexSource::new(client)),
            notifier: notifier::from_config(config.telegram.as_ref())?,
            clock: Arc::new(TokioClock::new()),
        },
    );

    match service.current_delta().await {
        Ok(delta) => info!(symbol = %config.hedge.symbol, %delta, "Current portfolio delta"),
        Err(e) => warn!(error = %e, "Could not read portfolio delta at startup"),
    }

    let state = service
        .run(service.initial_state(resume_hedged), shutdown_signal())
        .await?;

    info!(
        cycles = state.cycles,
        hedges = state.hedges,
        hedged_once = state.hedged_once,
        "Delta hedger stopped"
    );
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT (Ctrl+C), initiating graceful shutdown"),
        () = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}
