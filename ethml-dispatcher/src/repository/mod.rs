//! Repository Module
//!
//! Data access layer for the dispatcher.
//!
//! The tasks table doubles as the durable side of the task queue: every task
//! that is neither Completed nor Failed is reloaded into the queue on start-up.
//! Settlement records guard against submitting a result to the ledger twice.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use ethml_core::domain::job::Job;
use ethml_core::domain::settlement::SettlementRecord;
use ethml_core::domain::task::{FailureReason, Task, TaskId, TaskStatus};
use thiserror::Error;

pub use memory::MemoryTaskStore;
pub use postgres::PgTaskStore;

/// Store error type
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Task {0} not found")]
    TaskNotFound(TaskId),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Persistence for tasks and settlement records
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Inserts a new task
    ///
    /// Returns `false` without touching the stored row if the task id exists.
    async fn insert_task(&self, task: &Task) -> Result<bool>;

    /// Finds a task by id
    async fn get_task(&self, task_id: TaskId) -> Result<Option<Task>>;

    /// Moves a task to a new status
    ///
    /// `Pending` also moves the task to the tail of the durable queue order,
    /// `Dispatched` counts one more attempt.
    async fn set_status(
        &self,
        task_id: TaskId,
        status: TaskStatus,
        reason: Option<FailureReason>,
    ) -> Result<()>;

    /// Jobs of every task that is not Completed or Failed, in queue order
    async fn unsettled_jobs(&self) -> Result<Vec<Job>>;

    /// Finds the settlement record of a task
    async fn get_settlement(&self, task_id: TaskId) -> Result<Option<SettlementRecord>>;

    /// Writes a settlement record
    ///
    /// A record that is already submitted is never overwritten.
    async fn record_settlement(&self, record: &SettlementRecord) -> Result<()>;
}
