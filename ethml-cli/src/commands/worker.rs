//! Worker command handlers
//!
//! Handles all worker-related CLI commands including listing workers.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use ethml_client::DispatcherClient;
use ethml_core::dto::worker::WorkerSummary;

use crate::config::Config;

/// Worker subcommands
#[derive(Subcommand)]
pub enum WorkerCommands {
    /// List connected workers
    List,
}

/// Handle worker commands
pub async fn handle_worker_command(command: WorkerCommands, config: &Config) -> Result<()> {
    let client = DispatcherClient::new(&config.dispatcher_url);

    match command {
        WorkerCommands::List => list_workers(&client).await,
    }
}

/// List connected workers
async fn list_workers(client: &DispatcherClient) -> Result<()> {
    let workers = client.list_workers().await?;

    if workers.is_empty() {
        println!("{}", "No workers connected.".yellow());
    } else {
        println!(
            "{}",
            format!("Found {} connected worker(s):", workers.len()).bold()
        );
        println!();
        for worker in workers {
            print_worker_summary(&worker);
        }
    }

    Ok(())
}

/// Print a worker summary
fn print_worker_summary(worker: &WorkerSummary) {
    println!("  {} Worker {}", "▸".cyan(), worker.id.bold());
    println!(
        "    Load:         cpu {} / mem {}",
        colorize_load(worker.status.cpu_load),
        colorize_load(worker.status.mem_load)
    );
    println!(
        "    Jobs:         {} running, {} assigned",
        worker.status.active_jobs, worker.assigned_jobs
    );
    println!(
        "    Connected:    {}",
        worker
            .connected_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    println!(
        "    Last Seen:    {}",
        worker
            .last_seen
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    println!();
}

/// Colorize a load percentage for display
fn colorize_load(load: f32) -> colored::ColoredString {
    let load_str = format!("{:.1}%", load);
    if load >= 90.0 {
        load_str.red()
    } else if load >= 70.0 {
        load_str.yellow()
    } else {
        load_str.green()
    }
}
