//! EthML Worker
//!
//! A compute node that runs model predictions for the dispatcher.
//!
//! Architecture:
//! - Configuration: Load settings from environment (and `.env`) or defaults
//! - Services: Prediction, job execution, host status sampling
//! - Agent: WebSocket session with heartbeats and job replies
//!
//! The worker connects to the dispatcher's channel, reports its load every
//! heartbeat interval, and answers each dispatched job with a prediction or
//! an error.

mod agent;
mod config;
mod service;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::agent::WorkerAgent;
use crate::config::Config;
use crate::service::{
    ExecutionService, Predictor, ProcessPredictor, StandardExecutionService, StatusProbe,
    SystemStatusProbe,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ethml_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting EthML Worker");

    // Load configuration
    let config = Config::from_env();
    config.validate()?;
    info!(
        "Loaded configuration: dispatcher_ws_url={}, models_dir={}",
        config.dispatcher_ws_url,
        config.models_dir.display()
    );

    // Initialize services
    let predictor: Arc<dyn Predictor> = Arc::new(ProcessPredictor::new(
        config.python_bin.clone(),
        config.models_dir.clone(),
    ));
    let execution: Arc<dyn ExecutionService> =
        Arc::new(StandardExecutionService::new(predictor, config.job_timeout));
    let probe: Arc<dyn StatusProbe> = Arc::new(SystemStatusProbe::new());

    info!(
        "Heartbeat interval: {:?}, job timeout: {:?}",
        config.heartbeat_interval, config.job_timeout
    );

    let agent = WorkerAgent::new(config, execution, probe);

    tokio::select! {
        _ = agent.run() => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutdown signal received");
        }
    }

    info!("EthML Worker stopped");
    Ok(())
}
