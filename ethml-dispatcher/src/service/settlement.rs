//! Settlement Submitter
//!
//! Submits accepted predictions to the ledger, exactly once per task.
//!
//! The settlement record is checked and written under a per-task lock, so two
//! concurrent submissions for the same task produce a single ledger call.
//! Transient ledger failures are retried with capped exponential backoff.
//! Once the ledger holds the result the call succeeds, even if the record
//! cannot be written: the ledger is authoritative, and a later attempt for the
//! same task is answered with `Rejected`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use ethml_core::domain::settlement::{Prediction, SettlementRecord};
use ethml_core::domain::task::TaskId;
use ethml_core::error::{LedgerError, SettlementError};

use crate::ledger::Ledger;
use crate::repository::TaskStore;

/// Bounded retry policy for ledger submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total ledger calls per settlement, including the first
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Upper bound on a single ledger call
    pub call_timeout: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based)
    ///
    /// `initial_backoff * 2^(attempt - 1)`, capped at `max_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            call_timeout: Duration::from_secs(10),
        }
    }
}

/// How a settlement call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// This call submitted the result
    Submitted,

    /// The result was already on the ledger; nothing was submitted
    AlreadySettled,
}

/// Idempotent ledger submission
pub struct SettlementSubmitter {
    ledger: Arc<dyn Ledger>,
    store: Arc<dyn TaskStore>,
    policy: RetryPolicy,
    in_progress: Mutex<HashMap<TaskId, Arc<tokio::sync::Mutex<()>>>>,
}

impl SettlementSubmitter {
    pub fn new(ledger: Arc<dyn Ledger>, store: Arc<dyn TaskStore>, policy: RetryPolicy) -> Self {
        Self {
            ledger,
            store,
            policy,
            in_progress: Mutex::new(HashMap::new()),
        }
    }

    /// Whether the task's result is already on the ledger
    pub async fn is_settled(&self, task_id: TaskId) -> Result<bool, SettlementError> {
        let record = self
            .store
            .get_settlement(task_id)
            .await
            .map_err(|e| SettlementError::Store(e.to_string()))?;

        Ok(record.is_some_and(|record| record.submitted))
    }

    /// Submits a prediction for a task
    pub async fn submit(
        &self,
        task_id: TaskId,
        prediction: Prediction,
    ) -> Result<SettlementOutcome, SettlementError> {
        let lock = self.task_lock(task_id);
        let result = {
            let _guard = lock.lock().await;
            self.submit_locked(task_id, prediction).await
        };
        self.release_task_lock(task_id, lock);

        result
    }

    async fn submit_locked(
        &self,
        task_id: TaskId,
        prediction: Prediction,
    ) -> Result<SettlementOutcome, SettlementError> {
        if self.is_settled(task_id).await? {
            tracing::debug!(task_id, "Settlement already recorded, skipping");
            return Ok(SettlementOutcome::AlreadySettled);
        }

        let mut attempt = 0;
        loop {
            attempt += 1;

            match self.call_ledger(task_id, prediction.prediction).await {
                Ok(()) => {
                    self.record(task_id, prediction).await;
                    tracing::info!(
                        task_id,
                        prediction = prediction.prediction,
                        attempt,
                        "Result settled on ledger"
                    );
                    return Ok(SettlementOutcome::Submitted);
                }
                Err(LedgerError::Rejected(reason)) => {
                    // The ledger already holds a result for this task
                    self.record(task_id, prediction).await;
                    tracing::info!(task_id, reason = %reason, "Ledger reports task already settled");
                    return Ok(SettlementOutcome::AlreadySettled);
                }
                Err(LedgerError::Refused(reason)) => {
                    tracing::error!(task_id, reason = %reason, "Ledger refused the result");
                    return Err(SettlementError::Refused { task_id, reason });
                }
                Err(LedgerError::Transient(reason)) => {
                    if attempt >= self.policy.max_attempts {
                        tracing::error!(task_id, attempt, reason = %reason, "Settlement retries exhausted");
                        return Err(SettlementError::Exhausted {
                            task_id,
                            attempts: attempt,
                            last_error: reason,
                        });
                    }

                    let delay = self.policy.backoff(attempt);
                    tracing::warn!(
                        task_id,
                        attempt,
                        retry_in_ms = delay.as_millis() as u64,
                        reason = %reason,
                        "Transient ledger error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn call_ledger(&self, task_id: TaskId, prediction: i64) -> Result<(), LedgerError> {
        match tokio::time::timeout(
            self.policy.call_timeout,
            self.ledger.submit_result(task_id, prediction),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(LedgerError::Transient(format!(
                "Ledger call timed out after {:?}",
                self.policy.call_timeout
            ))),
        }
    }

    /// Writes the settlement record, retrying store failures under the policy
    async fn record(&self, task_id: TaskId, prediction: Prediction) {
        let record = SettlementRecord::submitted(task_id, prediction);

        let mut attempt = 0;
        loop {
            attempt += 1;

            match self.store.record_settlement(&record).await {
                Ok(()) => return,
                Err(e) if attempt >= self.policy.max_attempts => {
                    tracing::error!(
                        task_id,
                        attempt,
                        error = %e,
                        "Could not record settlement, ledger already holds the result"
                    );
                    return;
                }
                Err(e) => {
                    let delay = self.policy.backoff(attempt);
                    tracing::warn!(
                        task_id,
                        attempt,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %e,
                        "Failed to record settlement, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn task_lock(&self, task_id: TaskId) -> Arc<tokio::sync::Mutex<()>> {
        let mut in_progress = self
            .in_progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        Arc::clone(in_progress.entry(task_id).or_default())
    }

    fn release_task_lock(&self, task_id: TaskId, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut in_progress = self
            .in_progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Map entry plus ours: nobody else is waiting on this task
        if Arc::strong_count(&lock) == 2 {
            in_progress.remove(&task_id);
        }
    }

    /// Tasks with a settlement currently running or waiting
    pub fn in_progress(&self) -> usize {
        self.in_progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
