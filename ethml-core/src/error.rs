//! Error taxonomy for dispatch and settlement

use std::time::Duration;

use thiserror::Error;

use crate::domain::task::TaskId;
use crate::domain::worker::WorkerId;

/// Why a single dispatch attempt did not produce a result
///
/// Every variant except `AlreadyInFlight` is recovered by putting the job
/// back on the queue.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    /// No connected worker to select from
    #[error("No workers available")]
    NoWorkersAvailable,

    /// The worker did not reply before the assignment deadline
    #[error("Worker {worker_id} did not reply within {timeout:?}")]
    WorkerTimeout {
        worker_id: WorkerId,
        timeout: Duration,
    },

    /// The channel to the worker closed while the job was in flight
    #[error("Worker {0} disconnected")]
    WorkerDisconnected(WorkerId),

    /// The worker ran the job but its predictor failed
    #[error("Predictor failure: {0}")]
    PredictorFailure(String),

    /// Another attempt for this task is already in flight
    #[error("Task {0} already has a live assignment")]
    AlreadyInFlight(TaskId),
}

impl DispatchError {
    /// Whether the job should go back on the queue
    pub fn should_requeue(&self) -> bool {
        !matches!(self, DispatchError::AlreadyInFlight(_))
    }
}

/// Errors returned by the ledger collaborator
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// The ledger already holds a result for the task
    #[error("Ledger rejected the call: {0}")]
    Rejected(String),

    /// The ledger refused the call for good (bad request, credentials, unknown task)
    #[error("Ledger refused the call: {0}")]
    Refused(String),

    /// Network, node or timeout failure; the call may be retried
    #[error("Transient ledger error: {0}")]
    Transient(String),
}

impl LedgerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Transient(_))
    }
}

/// Terminal settlement failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettlementError {
    /// Transient ledger errors until the attempt ceiling was reached
    #[error("Settlement for task {task_id} failed after {attempts} attempt(s): {last_error}")]
    Exhausted {
        task_id: TaskId,
        attempts: u32,
        last_error: String,
    },

    /// The ledger refused the result and retrying cannot change that
    #[error("Ledger refused the result for task {task_id}: {reason}")]
    Refused { task_id: TaskId, reason: String },

    /// The settlement record could not be read
    #[error("Settlement store error: {0}")]
    Store(String),
}
