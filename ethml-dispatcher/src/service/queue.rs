//! Task Queue
//!
//! FIFO of jobs waiting for a worker.
//!
//! The in-memory deque is the hot path; the task store is the durable copy.
//! A task id is present in the deque at most once, and a requeued job goes
//! to the tail.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ethml_core::domain::job::Job;
use ethml_core::domain::task::{Task, TaskId, TaskStatus};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::repository::{self, TaskStore};

#[derive(Default)]
struct QueueState {
    jobs: VecDeque<Job>,
    queued: HashSet<TaskId>,
}

/// Durable FIFO of pending jobs
pub struct TaskQueue {
    state: Mutex<QueueState>,
    ready: Notify,
    store: Arc<dyn TaskStore>,
}

impl TaskQueue {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            ready: Notify::new(),
            store,
        }
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Persists a new task and queues its job
    ///
    /// Returns `false` if the task id was already known; nothing is queued in
    /// that case.
    pub async fn submit(&self, task: &Task) -> repository::Result<bool> {
        if !self.store.insert_task(task).await? {
            return Ok(false);
        }

        self.enqueue(task.job());
        tracing::info!(task_id = task.task_id, model_id = task.model_id, "Task queued");

        Ok(true)
    }

    /// Appends a job to the tail
    ///
    /// Returns `false` if the task is already queued.
    pub fn enqueue(&self, job: Job) -> bool {
        {
            let mut state = self.state();
            if !state.queued.insert(job.task_id) {
                return false;
            }
            state.jobs.push_back(job);
        }

        self.ready.notify_one();
        true
    }

    /// Puts a job back after a failed dispatch attempt
    ///
    /// The in-memory queue is updated even if the store write fails, so the
    /// job is never lost while the process is alive.
    pub async fn requeue(&self, job: Job) {
        let task_id = job.task_id;

        if let Err(e) = self
            .store
            .set_status(task_id, TaskStatus::Pending, None)
            .await
        {
            tracing::error!(task_id, error = %e, "Failed to persist requeue");
        }

        if self.enqueue(job) {
            tracing::debug!(task_id, "Job requeued");
        }
    }

    /// Pops the head job, waiting while the queue is empty
    ///
    /// Returns `None` once `cancel` fires.
    pub async fn dequeue(&self, cancel: &CancellationToken) -> Option<Job> {
        loop {
            if let Some(job) = self.try_dequeue() {
                return Some(job);
            }

            tokio::select! {
                _ = self.ready.notified() => {}
                _ = cancel.cancelled() => return None,
            }
        }
    }

    /// Pops the head job if there is one
    pub fn try_dequeue(&self) -> Option<Job> {
        let mut state = self.state();
        let job = state.jobs.pop_front()?;
        state.queued.remove(&job.task_id);
        Some(job)
    }

    /// Reloads every unsettled task from the store
    ///
    /// Called once at start-up, before any worker can connect.
    pub async fn restore(&self) -> repository::Result<usize> {
        let jobs = self.store.unsettled_jobs().await?;

        let mut restored = 0;
        for job in jobs {
            if self.enqueue(job) {
                restored += 1;
            }
        }

        if restored > 0 {
            tracing::info!(restored, "Restored unsettled tasks into the queue");
            tracing::debug!(tasks = ?self.task_ids(), "Queue order after restore");
        }

        Ok(restored)
    }

    /// Queued task ids, head first
    pub fn task_ids(&self) -> Vec<TaskId> {
        self.state().jobs.iter().map(|job| job.task_id).collect()
    }

    pub fn len(&self) -> usize {
        self.state().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryTaskStore;
    use std::time::Duration;

    fn task(id: TaskId) -> Task {
        Task::new(id, 1, format!("Qm{}", id), "0.1".to_string())
    }

    fn queue() -> (TaskQueue, Arc<MemoryTaskStore>) {
        let store = Arc::new(MemoryTaskStore::new());
        (TaskQueue::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_submit_is_fifo() {
        let (queue, _) = queue();
        for id in [3, 1, 2] {
            assert!(queue.submit(&task(id)).await.unwrap());
        }

        assert_eq!(queue.task_ids(), vec![3, 1, 2]);
        assert_eq!(queue.try_dequeue().unwrap().task_id, 3);
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn test_submit_duplicate_task_is_ignored() {
        let (queue, _) = queue();
        assert!(queue.submit(&task(1)).await.unwrap());
        assert!(!queue.submit(&task(1)).await.unwrap());
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_enqueue_deduplicates() {
        let (queue, _) = queue();
        assert!(queue.enqueue(task(1).job()));
        assert!(!queue.enqueue(task(1).job()));
        assert_eq!(queue.len(), 1);

        queue.try_dequeue();
        assert!(queue.is_empty());
        assert!(queue.enqueue(task(1).job()));
    }

    #[tokio::test]
    async fn test_requeue_goes_to_tail_and_marks_pending() {
        let (queue, store) = queue();
        for id in 1..=3 {
            queue.submit(&task(id)).await.unwrap();
        }

        let head = queue.try_dequeue().unwrap();
        store
            .set_status(head.task_id, TaskStatus::Dispatched, None)
            .await
            .unwrap();

        queue.requeue(head).await;
        assert_eq!(queue.task_ids(), vec![2, 3, 1]);

        let stored = store.get_task(1).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_dequeue_waits_for_enqueue() {
        let (queue, _) = queue();
        let queue = Arc::new(queue);
        let cancel = CancellationToken::new();

        let consumer = {
            let queue = Arc::clone(&queue);
            let cancel = cancel.clone();
            tokio::spawn(async move { queue.dequeue(&cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.enqueue(task(8).job());

        let job = consumer.await.unwrap().unwrap();
        assert_eq!(job.task_id, 8);
    }

    #[tokio::test]
    async fn test_dequeue_returns_none_when_cancelled() {
        let (queue, _) = queue();
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(queue.dequeue(&cancel).await.is_none());
    }

    #[tokio::test]
    async fn test_restore_reloads_unsettled_tasks_in_order() {
        let store = Arc::new(MemoryTaskStore::new());
        for id in 1..=4 {
            store.insert_task(&task(id)).await.unwrap();
        }
        store
            .set_status(2, TaskStatus::Completed, None)
            .await
            .unwrap();
        store
            .set_status(1, TaskStatus::Dispatched, None)
            .await
            .unwrap();

        let queue = TaskQueue::new(store);
        assert_eq!(queue.restore().await.unwrap(), 3);
        assert_eq!(queue.task_ids(), vec![1, 3, 4]);
    }
}
