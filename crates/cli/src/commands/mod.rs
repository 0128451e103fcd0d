mod inspect;
mod run;

pub use inspect::{run_bands, run_cancel_all, run_delta};
pub use run::{run_hedger, RunArgs};

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use delta_hedge_core::{AppConfig, ConfigLoader, Symbol};
use delta_hedge_deribit::DeribitClient;

/// Configuration source shared by every command.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Config file path
    #[arg(short, long, default_value = ConfigLoader::DEFAULT_PATH)]
    pub config: PathBuf,

    /// Asset to hedge, overriding the config file (BTC or ETH)
    #[arg(long)]
    pub symbol: Option<Symbol>,
}

impl ConfigArgs {
    /// Loads the file and environment, then applies command-line overrides.
    ///
    /// # Errors
    /// Returns error if the configuration is missing or invalid
    pub fn load(&self) -> Result<AppConfig> {
        let mut config = ConfigLoader::load_from(&self.config)?;
        if let Some(symbol) = self.symbol {
            config.hedge.symbol = symbol;
        }
        Ok(config)
    }
}

fn deribit_client(config: &AppConfig) -> Result<Arc<DeribitClient>> {
    let client = DeribitClient::new(&config.deribit).context("Failed to create Deribit client")?;
    Ok(Arc::new(client))
}
