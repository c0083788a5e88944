//! Worker agent
//!
//! Keeps one WebSocket session open to the dispatcher. Within a session it
//! sends a status heartbeat on a timer, runs every dispatched job in its own
//! task, and writes results back as they complete. A dropped channel is
//! reopened with exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use ethml_core::domain::job::Job;
use ethml_core::domain::worker::WorkerStatus;
use ethml_core::dto::channel::{AgentMessage, ServerMessage};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::service::{ExecutionService, StatusProbe};

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The dispatcher closed the channel
    Closed,
    /// A read or write on the channel failed
    Failed,
}

pub struct WorkerAgent {
    config: Config,
    execution: Arc<dyn ExecutionService>,
    probe: Arc<dyn StatusProbe>,
}

impl WorkerAgent {
    pub fn new(
        config: Config,
        execution: Arc<dyn ExecutionService>,
        probe: Arc<dyn StatusProbe>,
    ) -> Self {
        Self {
            config,
            execution,
            probe,
        }
    }

    /// Connects and serves sessions forever, reconnecting with backoff
    pub async fn run(&self) {
        let mut delay = self.config.reconnect_initial;

        loop {
            info!(url = %self.config.dispatcher_ws_url, "Connecting to dispatcher");

            match connect_async(self.config.dispatcher_ws_url.as_str()).await {
                Ok((ws_stream, _response)) => {
                    info!("Connected to dispatcher");
                    delay = self.config.reconnect_initial;

                    let end = self.run_session(ws_stream).await;
                    warn!(?end, "Dispatcher session ended, reconnecting");
                }
                Err(e) => {
                    error!(error = %e, "Failed to connect to dispatcher");
                }
            }

            debug!("Reconnecting in {:?}", delay);
            tokio::time::sleep(delay).await;
            delay = next_backoff(delay, self.config.reconnect_max);
        }
    }

    /// Drives one session until the channel closes or fails
    ///
    /// Results of jobs still running when the session ends are dropped; the
    /// dispatcher requeues those jobs on disconnect.
    pub async fn run_session<S>(&self, ws_stream: WebSocketStream<S>) -> SessionEnd
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut sink, mut stream) = ws_stream.split();
        let (results_tx, mut results_rx) = mpsc::unbounded_channel::<AgentMessage>();
        let mut ticker = tokio::time::interval(self.config.heartbeat_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let status = self.current_status();
                    if let Err(e) = send_message(&mut sink, &AgentMessage::Status(status)).await {
                        error!(error = %e, "Failed to send status");
                        return SessionEnd::Failed;
                    }
                }
                Some(result) = results_rx.recv() => {
                    if let Err(e) = send_message(&mut sink, &result).await {
                        error!(error = %e, "Failed to send result");
                        return SessionEnd::Failed;
                    }
                }
                msg = stream.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_incoming(&text, &results_tx);
                        }
                        Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                            // Handled automatically by tungstenite
                        }
                        Some(Ok(Message::Close(frame))) => {
                            info!(?frame, "Dispatcher closed the channel");
                            return SessionEnd::Closed;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!(error = %e, "Channel receive error");
                            return SessionEnd::Failed;
                        }
                        None => {
                            info!("Channel stream exhausted");
                            return SessionEnd::Closed;
                        }
                    }
                }
            }
        }
    }

    fn current_status(&self) -> WorkerStatus {
        let (cpu_load, mem_load) = self.probe.sample();
        WorkerStatus::new(cpu_load, mem_load, self.execution.active_jobs())
    }

    fn handle_incoming(&self, text: &str, results: &mpsc::UnboundedSender<AgentMessage>) {
        match serde_json::from_str::<ServerMessage>(text) {
            Ok(ServerMessage::Welcome { worker_id }) => {
                info!(worker_id = %worker_id, "Registered with dispatcher");
            }
            Ok(ServerMessage::Dispatch(job)) => {
                self.spawn_job_task(job, results.clone());
            }
            Err(e) => {
                warn!(error = %e, raw = %text, "Unknown or malformed message");
            }
        }
    }

    /// Runs a job off the session loop so heartbeats keep flowing
    fn spawn_job_task(&self, job: Job, results: mpsc::UnboundedSender<AgentMessage>) {
        let execution = Arc::clone(&self.execution);

        tokio::spawn(async move {
            let task_id = job.task_id;
            info!("Received task {}", task_id);

            let outcome = execution.execute(&job).await;
            if results
                .send(AgentMessage::Result { task_id, outcome })
                .is_err()
            {
                warn!("Session ended before task {} finished, result dropped", task_id);
            }
        });
    }
}

/// Doubles the reconnect delay up to `max`
fn next_backoff(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}

/// Serializes a message and sends it as a JSON text frame
async fn send_message<S>(sink: &mut S, message: &AgentMessage) -> Result<(), tungstenite::Error>
where
    S: SinkExt<Message, Error = tungstenite::Error> + Unpin,
{
    let json = serde_json::to_string(message)
        .map_err(|e| tungstenite::Error::Io(std::io::Error::other(e)))?;
    sink.send(Message::Text(json)).await
}
