//! In-memory Task Store
//!
//! Non-durable store used by tests and by dispatcher runs started with
//! `DATABASE_URL=memory`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use ethml_core::domain::job::Job;
use ethml_core::domain::settlement::SettlementRecord;
use ethml_core::domain::task::{FailureReason, Task, TaskId, TaskStatus};

use super::{Result, StoreError, TaskStore};

#[derive(Default)]
struct MemoryState {
    /// Task plus its position in queue order
    tasks: HashMap<TaskId, (Task, u64)>,
    settlements: HashMap<TaskId, SettlementRecord>,
    next_seq: u64,
}

impl MemoryState {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

/// Task store that keeps everything in process memory
#[derive(Default)]
pub struct MemoryTaskStore {
    state: Mutex<MemoryState>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn insert_task(&self, task: &Task) -> Result<bool> {
        let mut state = self.state();
        if state.tasks.contains_key(&task.task_id) {
            return Ok(false);
        }

        let seq = state.next_seq();
        state.tasks.insert(task.task_id, (task.clone(), seq));
        Ok(true)
    }

    async fn get_task(&self, task_id: TaskId) -> Result<Option<Task>> {
        Ok(self.state().tasks.get(&task_id).map(|(task, _)| task.clone()))
    }

    async fn set_status(
        &self,
        task_id: TaskId,
        status: TaskStatus,
        reason: Option<FailureReason>,
    ) -> Result<()> {
        let mut state = self.state();
        let seq = state.next_seq();
        let (task, queue_seq) = state
            .tasks
            .get_mut(&task_id)
            .ok_or(StoreError::TaskNotFound(task_id))?;

        task.status = status;
        task.failure_reason = reason;
        task.updated_at = chrono::Utc::now();

        match status {
            TaskStatus::Pending => *queue_seq = seq,
            TaskStatus::Dispatched => task.attempts += 1,
            TaskStatus::Completed | TaskStatus::Failed => {}
        }

        Ok(())
    }

    async fn unsettled_jobs(&self) -> Result<Vec<Job>> {
        let state = self.state();
        let mut unsettled: Vec<_> = state
            .tasks
            .values()
            .filter(|(task, _)| !task.status.is_terminal())
            .collect();
        unsettled.sort_by_key(|(_, seq)| *seq);

        Ok(unsettled.into_iter().map(|(task, _)| task.job()).collect())
    }

    async fn get_settlement(&self, task_id: TaskId) -> Result<Option<SettlementRecord>> {
        Ok(self.state().settlements.get(&task_id).cloned())
    }

    async fn record_settlement(&self, record: &SettlementRecord) -> Result<()> {
        let mut state = self.state();
        let already_submitted = state
            .settlements
            .get(&record.task_id)
            .is_some_and(|existing| existing.submitted);

        if !already_submitted {
            state.settlements.insert(record.task_id, record.clone());
        }

        Ok(())
    }
}
