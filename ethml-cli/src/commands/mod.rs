//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod health;
mod task;
mod worker;

pub use task::TaskCommands;
pub use worker::WorkerCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Task submission and status
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Worker pool inspection
    Worker {
        #[command(subcommand)]
        command: WorkerCommands,
    },
    /// Show dispatcher health
    Health,
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Task { command } => task::handle_task_command(command, config).await,
        Commands::Worker { command } => worker::handle_worker_command(command, config).await,
        Commands::Health => health::show_health(config).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(subcommand)]
        command: Commands,
    }

    #[test]
    fn test_parse_task_submit() {
        let cli = TestCli::try_parse_from([
            "ethml", "task", "submit", "--model-id", "2", "--data-point", "QmPoint", "--tip",
            "0.5",
        ])
        .unwrap();

        match cli.command {
            Commands::Task {
                command:
                    TaskCommands::Submit {
                        model_id,
                        data_point,
                        tip,
                    },
            } => {
                assert_eq!(model_id, 2);
                assert_eq!(data_point, "QmPoint");
                assert_eq!(tip, "0.5");
            }
            _ => panic!("expected task submit"),
        }
    }

    #[test]
    fn test_parse_task_status() {
        let cli = TestCli::try_parse_from(["ethml", "task", "status", "42"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Task {
                command: TaskCommands::Status { task_id: 42 }
            }
        ));
    }

    #[test]
    fn test_task_id_must_be_numeric() {
        assert!(TestCli::try_parse_from(["ethml", "task", "status", "abc"]).is_err());
    }

    #[test]
    fn test_parse_worker_list() {
        let cli = TestCli::try_parse_from(["ethml", "worker", "list"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Worker {
                command: WorkerCommands::List
            }
        ));
    }
}
