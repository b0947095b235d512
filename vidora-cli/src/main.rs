//! Vidora CLI - Command-line interface
//!
//! Runs the video server and inspects directories for ingestion.

mod commands;

use anyhow::anyhow;
use clap::Parser;
use vidora_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "vidora")]
#[command(about = "A byte-range video streaming server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: commands::Commands,

    /// Console log level
    #[arg(long, global = true, default_value = "info")]
    log_level: CliLogLevel,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_level.as_tracing_level(), None)
        .map_err(|e| anyhow!("Failed to initialize tracing: {e}"))?;

    commands::handle_command(cli.command).await
}
