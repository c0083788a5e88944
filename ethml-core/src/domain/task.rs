//! Task domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::job::Job;

/// Ledger-issued task identifier
pub type TaskId = u64;

/// Identifier of the model a prediction is requested from
pub type ModelId = u64;

/// A paid prediction request
///
/// Structure shared between the dispatcher (persists and transitions it) and
/// clients (read its status).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    pub model_id: ModelId,
    pub data_point: String,
    /// Tip escrowed on the ledger, as a decimal amount
    pub tip: String,
    pub status: TaskStatus,
    /// Set only when `status` is `Failed`
    pub failure_reason: Option<FailureReason>,
    /// Number of times the job was handed to a worker
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a new pending task
    pub fn new(task_id: TaskId, model_id: ModelId, data_point: String, tip: String) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            model_id,
            data_point,
            tip,
            status: TaskStatus::Pending,
            failure_reason: None,
            attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// The queued representation of this task
    pub fn job(&self) -> Job {
        Job {
            task_id: self.task_id,
            model_id: self.model_id,
            data_point: self.data_point.clone(),
        }
    }
}

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Waiting in the queue
    Pending,

    /// Sent to a worker, reply outstanding
    Dispatched,

    /// Result settled on the ledger
    Completed,

    /// Terminal failure, see the task's failure reason
    Failed,
}

impl TaskStatus {
    /// Completed and Failed tasks never go back to the queue
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "Pending"),
            TaskStatus::Dispatched => write!(f, "Dispatched"),
            TaskStatus::Completed => write!(f, "Completed"),
            TaskStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Reason code attached to a Failed task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Ledger submission kept failing until the retry ceiling was reached
    SettlementFailed,

    /// The ledger refused the result outright
    LedgerRefused,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureReason::SettlementFailed => "settlement_failed",
            FailureReason::LedgerRefused => "ledger_refused",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "settlement_failed" => Some(FailureReason::SettlementFailed),
            "ledger_refused" => Some(FailureReason::LedgerRefused),
            _ => None,
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
