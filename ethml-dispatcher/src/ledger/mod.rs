//! Ledger Module
//!
//! The ledger is the system of record for tasks and payments. The dispatcher
//! only needs three calls from it: create a task, read a task, and submit the
//! validated prediction for a task.

pub mod http;

use async_trait::async_trait;
use ethml_core::domain::task::{ModelId, TaskId};
use ethml_core::error::LedgerError;

pub use http::HttpLedger;

/// Contract calls used by the dispatcher
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Submits the accepted prediction for a task
    async fn submit_result(&self, task_id: TaskId, prediction: i64) -> Result<(), LedgerError>;

    /// Creates a paid prediction request and returns its ledger task id
    async fn request_prediction(
        &self,
        model_id: ModelId,
        data_point: &str,
        tip: &str,
    ) -> Result<TaskId, LedgerError>;

    /// Reads the ledger's view of a task
    async fn get_task(&self, task_id: TaskId) -> Result<serde_json::Value, LedgerError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted ledger for in-process tests

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::{Mutex, PoisonError};
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    #[derive(Default)]
    pub struct ScriptedLedger {
        /// Results handed out by `submit_result`, front first; `Ok` once empty
        script: Mutex<VecDeque<Result<(), LedgerError>>>,
        submissions: Mutex<Vec<(TaskId, i64)>>,
        /// Per-call delays before `submit_result` answers, front first
        delays: Mutex<VecDeque<Duration>>,
        /// Calls that ran to the end and returned `Ok`
        completed: AtomicUsize,
        next_task_id: AtomicU64,
        unreachable: bool,
    }

    impl ScriptedLedger {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_script(script: Vec<Result<(), LedgerError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                ..Self::default()
            }
        }

        /// Answers `Ok` after sleeping for each delay in turn
        pub fn with_delays(delays: Vec<Duration>) -> Self {
            Self {
                delays: Mutex::new(delays.into()),
                ..Self::default()
            }
        }

        /// Every call fails with a transient error
        pub fn unreachable() -> Self {
            Self {
                unreachable: true,
                ..Self::default()
            }
        }

        pub fn submissions(&self) -> Vec<(TaskId, i64)> {
            self.submissions
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        pub fn submission_count(&self) -> usize {
            self.submissions().len()
        }

        pub fn completed_count(&self) -> usize {
            self.completed.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Ledger for ScriptedLedger {
        async fn submit_result(&self, task_id: TaskId, prediction: i64) -> Result<(), LedgerError> {
            self.submissions
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((task_id, prediction));

            if self.unreachable {
                return Err(LedgerError::Transient("connection refused".to_string()));
            }

            let delay = self
                .delays
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let result = self
                .script
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front()
                .unwrap_or(Ok(()));
            if result.is_ok() {
                self.completed.fetch_add(1, Ordering::SeqCst);
            }
            result
        }

        async fn request_prediction(
            &self,
            _model_id: ModelId,
            _data_point: &str,
            _tip: &str,
        ) -> Result<TaskId, LedgerError> {
            if self.unreachable {
                return Err(LedgerError::Transient("connection refused".to_string()));
            }
            Ok(self.next_task_id.fetch_add(1, Ordering::SeqCst) + 1)
        }

        async fn get_task(&self, task_id: TaskId) -> Result<serde_json::Value, LedgerError> {
            if self.unreachable {
                return Err(LedgerError::Transient("connection refused".to_string()));
            }
            Ok(serde_json::json!({ "task_id": task_id, "settled": false }))
        }
    }

    /// Starts a local HTTP gateway answering every request with `status_line`
    ///
    /// Returns the base URL to hand to `HttpLedger`.
    pub async fn gateway_replying(status_line: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    // Read the whole request so closing the socket does not reset it
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    loop {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => {
                                request.extend_from_slice(&buf[..n]);
                                if request_complete(&request) {
                                    break;
                                }
                            }
                        }
                    }

                    let response = format!(
                        "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{{}}",
                        status_line
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        format!("http://{}", addr)
    }

    /// Headers received and the body is as long as `content-length` says
    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };

        let content_length = text[..header_end]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);

        request.len() >= header_end + 4 + content_length
    }
}
