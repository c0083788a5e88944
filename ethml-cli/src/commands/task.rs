//! Task command handlers
//!
//! Handles submitting tasks, queueing ledger-issued tasks, and showing
//! task status.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use ethml_client::DispatcherClient;
use ethml_core::domain::task::{ModelId, TaskId, TaskStatus};
use ethml_core::dto::task::{CreateJob, SubmitTask, TaskStatusResponse};

use crate::config::Config;

/// Task subcommands
#[derive(Subcommand)]
pub enum TaskCommands {
    /// Create a paid task on the ledger and queue it
    Submit {
        /// Model to run
        #[arg(long)]
        model_id: ModelId,

        /// Input reference (e.g. a content address)
        #[arg(long)]
        data_point: String,

        /// Tip escrowed for the task, as a decimal amount
        #[arg(long, default_value = "0")]
        tip: String,
    },
    /// Queue a task that already exists on the ledger
    Job {
        /// Ledger task id
        #[arg(long)]
        task_id: TaskId,

        #[arg(long)]
        model_id: ModelId,

        #[arg(long)]
        data_point: String,

        #[arg(long, default_value = "0")]
        tip: String,
    },
    /// Show a task's status
    Status {
        /// Ledger task id
        task_id: TaskId,
    },
}

/// Handle task commands
pub async fn handle_task_command(command: TaskCommands, config: &Config) -> Result<()> {
    let client = DispatcherClient::new(&config.dispatcher_url);

    match command {
        TaskCommands::Submit {
            model_id,
            data_point,
            tip,
        } => {
            submit_task(
                &client,
                SubmitTask {
                    model_id,
                    data_point,
                    tip,
                },
            )
            .await
        }
        TaskCommands::Job {
            task_id,
            model_id,
            data_point,
            tip,
        } => {
            create_job(
                &client,
                CreateJob {
                    task_id,
                    model_id,
                    data_point,
                    tip,
                },
            )
            .await
        }
        TaskCommands::Status { task_id } => show_task(&client, task_id).await,
    }
}

/// Submit a new paid task
async fn submit_task(client: &DispatcherClient, req: SubmitTask) -> Result<()> {
    println!("{}", "Submitting task...".cyan());

    let created = client
        .submit_task(req)
        .await
        .context("Failed to submit task")?;

    println!("{}", "✓ Task submitted".green());
    println!("  Task ID: {}", created.task_id.to_string().bold());

    Ok(())
}

/// Queue a ledger-issued task
async fn create_job(client: &DispatcherClient, req: CreateJob) -> Result<()> {
    let task_id = req.task_id;

    match client.create_job(req).await {
        Ok(created) => {
            println!("{}", "✓ Task queued".green());
            println!("  Task ID: {}", created.task_id.to_string().bold());
            Ok(())
        }
        Err(e) if e.is_conflict() => {
            println!(
                "{}",
                format!("Task {} is already known to the dispatcher.", task_id).yellow()
            );
            Ok(())
        }
        Err(e) => Err(e).context("Failed to queue task"),
    }
}

/// Show a task's status
async fn show_task(client: &DispatcherClient, task_id: TaskId) -> Result<()> {
    let status = client
        .get_task(task_id)
        .await
        .with_context(|| format!("Failed to get task {}", task_id))?;

    print_task_details(&status)
}

/// Print detailed task information
fn print_task_details(status: &TaskStatusResponse) -> Result<()> {
    let task = &status.task;

    println!("{}", format!("Task {}", task.task_id).bold());
    println!("  Status:     {}", colorize_status(task.status));
    if let Some(reason) = task.failure_reason {
        println!("  Reason:     {}", reason.to_string().red());
    }
    println!("  Model:      {}", task.model_id);
    println!("  Data point: {}", task.data_point);
    println!("  Tip:        {}", task.tip);
    println!("  Attempts:   {}", task.attempts);
    println!(
        "  Created:    {}",
        task.created_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    println!(
        "  Updated:    {}",
        task.updated_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );

    match &status.ledger {
        Some(ledger) => {
            println!();
            println!("{}", "Ledger:".bold());
            println!("{}", serde_json::to_string_pretty(ledger)?);
        }
        None => {
            println!();
            println!("{}", "Ledger unreachable, showing local record only.".yellow());
        }
    }

    Ok(())
}

/// Colorize task status for display
fn colorize_status(status: TaskStatus) -> colored::ColoredString {
    let status_str = status.to_string();
    match status {
        TaskStatus::Pending => status_str.yellow(),
        TaskStatus::Dispatched => status_str.cyan(),
        TaskStatus::Completed => status_str.green(),
        TaskStatus::Failed => status_str.red(),
    }
}
