//! Job domain types

use serde::{Deserialize, Serialize};

use crate::domain::task::{ModelId, TaskId};

/// Unit of dispatch work
///
/// Derived 1:1 from a [`Task`](crate::domain::task::Task) when it is queued.
/// The same value travels over the worker channel inside a dispatch message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub task_id: TaskId,
    pub model_id: ModelId,
    /// Opaque reference to the input (e.g. a content address)
    pub data_point: String,
}

/// Outcome of a job as reported by a worker agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Success { prediction: i64, confidence: f64 },
    Failure { error: String },
}

impl JobOutcome {
    pub fn failure(error: impl Into<String>) -> Self {
        JobOutcome::Failure {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success { .. })
    }
}
