//! Task intake DTOs

use serde::{Deserialize, Serialize};

use crate::domain::task::{ModelId, Task, TaskId};

/// Request to create a paid task on the ledger and queue it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitTask {
    pub model_id: ModelId,
    pub data_point: String,
    pub tip: String,
}

/// Request to queue a task the ledger already issued
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJob {
    pub task_id: TaskId,
    pub model_id: ModelId,
    pub data_point: String,
    pub tip: String,
}

impl CreateJob {
    pub fn into_task(self) -> Task {
        Task::new(self.task_id, self.model_id, self.data_point, self.tip)
    }
}

/// Response to a task submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCreated {
    pub task_id: TaskId,
}

/// Local task record plus whatever the ledger reports about it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    pub task: Task,
    /// Omitted when the ledger could not be reached
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger: Option<serde_json::Value>,
}
