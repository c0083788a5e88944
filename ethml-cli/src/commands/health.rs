//! Health command handler

use anyhow::{Context, Result};
use colored::*;
use ethml_client::DispatcherClient;

use crate::config::Config;

/// Show dispatcher health
pub async fn show_health(config: &Config) -> Result<()> {
    let client = DispatcherClient::new(&config.dispatcher_url);
    let health = client
        .health()
        .await
        .with_context(|| format!("Dispatcher at {} is not reachable", config.dispatcher_url))?;

    println!("Dispatcher: {}", health.status.green());
    println!("  Workers:   {}", health.workers);
    println!("  Queued:    {}", health.queued);
    println!("  In flight: {}", health.in_flight);

    Ok(())
}
