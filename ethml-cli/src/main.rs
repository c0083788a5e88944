//! EthML CLI
//!
//! Command-line interface for interacting with the EthML dispatcher.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "ethml")]
#[command(about = "EthML prediction dispatch CLI", long_about = None)]
struct Cli {
    /// Dispatcher URL
    #[arg(
        long,
        env = "ETHML_DISPATCHER_URL",
        default_value = "http://localhost:8080"
    )]
    dispatcher_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        dispatcher_url: cli.dispatcher_url,
    };

    handle_command(cli.command, &config).await
}
