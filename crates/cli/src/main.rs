//! Shopdesk CLI - drive the admin API through the session-aware client

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::Commands;
use shopdesk_core::tracing::{InstrumentationConfig, init_tracing};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "shopdesk")]
#[command(about = "Session-aware client for the Shopdesk admin API")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long = "config", global = true, env = "SHOPDESK_CONFIG")]
    config: Option<PathBuf>,

    /// Override the log level from configuration
    #[arg(short = 'l', long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = config::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    init_tracing(&InstrumentationConfig::from_logging(
        "shopdesk-cli",
        &config.logging,
    ))?;

    info!(base_url = %config.api.base_url, "Starting Shopdesk CLI");

    if let Err(e) = cli.command.execute(&config).await {
        error!("Command failed: {e:#}");
        std::process::exit(1);
    }

    Ok(())
}
