//! One-shot account and market queries.

use anyhow::{Context, Result};
use delta_hedge_core::{ExchangeGateway, IndexPriceSource};
use delta_hedge_deribit::{DeribitGateway, DeribitIndexSource};
use delta_hedge_engine::BandMonitor;
use rust_decimal::Decimal;

use super::{deribit_client, ConfigArgs};

/// Prints the current portfolio delta.
pub async fn run_delta(args: ConfigArgs) -> Result<()> {
    let config = args.load()?;
    let gateway = DeribitGateway::new(deribit_client(&config)?);

    let delta = gateway
        .portfolio_delta(config.hedge.symbol)
        .await
        .context("Failed to fetch portfolio delta")?;
    println!("{} portfolio delta: {delta}", config.hedge.symbol);
    Ok(())
}

/// Prints the configured bands around the strike and where the index sits.
pub async fn run_bands(args: ConfigArgs) -> Result<()> {
    let config = args.load()?;
    let index = DeribitIndexSource::new(deribit_client(&config)?);
    let price = index
        .index_price(config.hedge.symbol)
        .await
        .context("Failed to fetch index price")?;

    let monitor = BandMonitor::new(&config.hedge);
    let mut bands = monitor.bands();
    bands.sort_by(|a, b| b.level.cmp(&a.level));

    println!(
        "{} index {price} (strike {})",
        config.hedge.symbol.index_name(),
        config.hedge.strike
    );
    for band in bands {
        let marker = if band.is_upper() && price > band.price
            || !band.is_upper() && price < band.price
        {
            "  <- breached"
        } else {
            ""
        };
        println!("  L{:+}  {}{marker}", band.level, band.price);
    }

    let triggers = monitor.evaluate(price, Decimal::ZERO);
    println!("Checks triggered with a flat position: {}", triggers.len());
    Ok(())
}

/// Cancels every open order on the configured perpetual.
pub async fn run_cancel_all(args: ConfigArgs) -> Result<()> {
    let config = args.load()?;
    let gateway = DeribitGateway::new(deribit_client(&config)?);
    let instrument = config.hedge.symbol.perpetual();

    let cancelled = gateway
        .cancel_all_open_orders(&instrument)
        .await
        .context("Failed to cancel open orders")?;
    println!("Cancelled {cancelled} open order(s) on {instrument}");
    Ok(())
}
