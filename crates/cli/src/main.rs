use clap::{Parser, Subcommand};

mod commands;

use commands::{ConfigArgs, RunArgs};

#[derive(Parser)]
#[command(name = "delta-hedge")]
#[command(about = "Automated delta hedging for Deribit options portfolios", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run continuous delta hedging until Ctrl+C
    Run(RunArgs),
    /// Print the current portfolio delta
    Delta(ConfigArgs),
    /// Print the price bands and the current index price
    Bands(ConfigArgs),
    /// Cancel all open orders on the perpetual
    CancelAll(ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Run(args) => commands::run_hedger(args).await?,
        Commands::Delta(args) => commands::run_delta(args).await?,
        Commands::Bands(args) => commands::run_bands(args).await?,
        Commands::CancelAll(args) => commands::run_cancel_all(args).await?,
    }

    Ok(())
}
