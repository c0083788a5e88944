//! Worker configuration
//!
//! Defines all configurable parameters for the worker agent: where the
//! dispatcher lives, how often to report status, and how predictions are run.

use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Dispatcher worker channel (e.g., "ws://localhost:8080/ws")
    pub dispatcher_ws_url: String,

    /// How often to send a status heartbeat
    pub heartbeat_interval: Duration,

    /// Maximum time a single prediction may run
    pub job_timeout: Duration,

    /// Directory holding the `model_{id}.py` scripts
    pub models_dir: PathBuf,

    /// Interpreter used to run model scripts
    pub python_bin: String,

    /// First delay before reconnecting after the channel drops
    pub reconnect_initial: Duration,

    /// Cap on the reconnect delay
    pub reconnect_max: Duration,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(dispatcher_ws_url: String) -> Self {
        Self {
            dispatcher_ws_url,
            heartbeat_interval: Duration::from_secs(5),
            job_timeout: Duration::from_secs(25),
            models_dir: PathBuf::from("./models"),
            python_bin: "python3".to_string(),
            reconnect_initial: Duration::from_secs(1),
            reconnect_max: Duration::from_secs(30),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - DISPATCHER_WS_URL (optional, default: ws://localhost:8080/ws)
    /// - HEARTBEAT_INTERVAL (optional, seconds, default: 5)
    /// - JOB_TIMEOUT (optional, seconds, default: 25)
    /// - MODELS_DIR (optional, default: ./models)
    /// - PYTHON_BIN (optional, default: python3)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let dispatcher_ws_url =
            std::env::var("DISPATCHER_WS_URL").unwrap_or(defaults.dispatcher_ws_url);

        let heartbeat_interval = std::env::var("HEARTBEAT_INTERVAL")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.heartbeat_interval);

        let job_timeout = std::env::var("JOB_TIMEOUT")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.job_timeout);

        let models_dir = std::env::var("MODELS_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.models_dir);

        let python_bin = std::env::var("PYTHON_BIN").unwrap_or(defaults.python_bin);

        Self {
            dispatcher_ws_url,
            heartbeat_interval,
            job_timeout,
            models_dir,
            python_bin,
            ..defaults
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.dispatcher_ws_url.starts_with("ws://")
            && !self.dispatcher_ws_url.starts_with("wss://")
        {
            anyhow::bail!("dispatcher_ws_url must start with ws:// or wss://");
        }

        if self.heartbeat_interval.as_secs() == 0 {
            anyhow::bail!("heartbeat_interval must be greater than 0");
        }

        if self.job_timeout.as_secs() == 0 {
            anyhow::bail!("job_timeout must be greater than 0");
        }

        if self.python_bin.is_empty() {
            anyhow::bail!("python_bin cannot be empty");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("ws://localhost:8080/ws".to_string())
    }
}
