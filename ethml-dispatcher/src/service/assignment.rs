//! Assignment Table
//!
//! Pending request table for jobs in flight, keyed by task id.
//!
//! Each entry holds the reply slot of the dispatch attempt that created it.
//! Entries leave the table through exactly one of: a reply, a worker
//! cancellation, or the owning attempt releasing it after its deadline. A
//! reply that arrives after the entry is gone finds nothing and is dropped.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ethml_core::domain::assignment::Assignment;
use ethml_core::domain::job::JobOutcome;
use ethml_core::domain::task::TaskId;
use ethml_core::error::DispatchError;
use tokio::sync::oneshot;

/// What ended an assignment
#[derive(Debug, Clone, PartialEq)]
pub enum AssignmentOutcome {
    /// The worker replied
    Replied(JobOutcome),

    /// The worker went away before replying
    Cancelled,
}

struct PendingAssignment {
    assignment: Assignment,
    reply: oneshot::Sender<AssignmentOutcome>,
}

/// Table of live assignments
#[derive(Default)]
pub struct AssignmentTable {
    pending: Mutex<HashMap<TaskId, PendingAssignment>>,
}

impl AssignmentTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<TaskId, PendingAssignment>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a new assignment and returns the slot its outcome arrives on
    ///
    /// Fails with `AlreadyInFlight` if the task already has a live assignment.
    pub fn assign(
        &self,
        task_id: TaskId,
        worker_id: &str,
        reply_timeout: Duration,
    ) -> Result<oneshot::Receiver<AssignmentOutcome>, DispatchError> {
        let mut pending = self.pending();

        if pending.contains_key(&task_id) {
            return Err(DispatchError::AlreadyInFlight(task_id));
        }

        let (reply, receiver) = oneshot::channel();
        pending.insert(
            task_id,
            PendingAssignment {
                assignment: Assignment::new(task_id, worker_id.to_string(), reply_timeout),
                reply,
            },
        );

        Ok(receiver)
    }

    /// Delivers a worker's reply
    ///
    /// Returns `false` when there is no live assignment of this task to this
    /// worker, i.e. the reply is late or comes from the wrong worker.
    pub fn resolve(&self, task_id: TaskId, worker_id: &str, outcome: JobOutcome) -> bool {
        let entry = {
            let mut pending = self.pending();
            match pending.get(&task_id) {
                Some(entry) if entry.assignment.worker_id == worker_id => pending.remove(&task_id),
                _ => None,
            }
        };

        match entry {
            Some(entry) => entry.reply.send(AssignmentOutcome::Replied(outcome)).is_ok(),
            None => false,
        }
    }

    /// Cancels every assignment held by a worker
    ///
    /// Returns the affected task ids. Each waiting dispatch attempt receives
    /// `Cancelled` and requeues its job.
    pub fn cancel_worker(&self, worker_id: &str) -> Vec<TaskId> {
        let cancelled: Vec<_> = {
            let mut pending = self.pending();
            let task_ids: Vec<_> = pending
                .iter()
                .filter(|(_, entry)| entry.assignment.worker_id == worker_id)
                .map(|(task_id, _)| *task_id)
                .collect();

            task_ids
                .into_iter()
                .filter_map(|task_id| pending.remove(&task_id).map(|entry| (task_id, entry)))
                .collect()
        };

        let mut task_ids = Vec::with_capacity(cancelled.len());
        for (task_id, entry) in cancelled {
            let _ = entry.reply.send(AssignmentOutcome::Cancelled);
            task_ids.push(task_id);
        }
        task_ids.sort_unstable();
        task_ids
    }

    /// Drops the assignment if it is still owned by `worker_id`
    ///
    /// Called by the dispatch attempt once it stops waiting, whatever the
    /// reason. Returns whether an entry was removed.
    pub fn release(&self, task_id: TaskId, worker_id: &str) -> bool {
        let mut pending = self.pending();

        match pending.get(&task_id) {
            Some(entry) if entry.assignment.worker_id == worker_id => {
                pending.remove(&task_id);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.pending().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(30);

    fn success(prediction: i64) -> JobOutcome {
        JobOutcome::Success {
            prediction,
            confidence: 0.9,
        }
    }

    #[tokio::test]
    async fn test_second_assignment_for_same_task_is_refused() {
        let table = AssignmentTable::new();
        let _rx = table.assign(4, "w1", TIMEOUT).unwrap();

        let err = table.assign(4, "w2", TIMEOUT).unwrap_err();
        assert_eq!(err, DispatchError::AlreadyInFlight(4));
        assert_eq!(table.len(), 1);

        // The original owner still holds it
        assert!(!table.release(4, "w2"));
        assert!(table.release(4, "w1"));
    }

    #[tokio::test]
    async fn test_resolve_delivers_reply_once() {
        let table = AssignmentTable::new();
        let rx = table.assign(4, "w1", TIMEOUT).unwrap();

        assert!(table.resolve(4, "w1", success(358)));
        assert_eq!(rx.await.unwrap(), AssignmentOutcome::Replied(success(358)));
        assert!(table.is_empty());

        // Duplicate reply finds nothing
        assert!(!table.resolve(4, "w1", success(358)));
    }

    #[tokio::test]
    async fn test_reply_from_other_worker_is_ignored() {
        let table = AssignmentTable::new();
        let _rx = table.assign(4, "w1", TIMEOUT).unwrap();

        assert!(!table.resolve(4, "w2", success(1)));
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_late_reply_after_release_is_ignored() {
        let table = AssignmentTable::new();
        let _rx = table.assign(4, "w1", TIMEOUT).unwrap();

        assert!(table.release(4, "w1"));
        assert!(!table.resolve(4, "w1", success(358)));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_worker_only_touches_its_assignments() {
        let table = AssignmentTable::new();
        let rx1 = table.assign(1, "w1", TIMEOUT).unwrap();
        let rx2 = table.assign(2, "w1", TIMEOUT).unwrap();
        let _rx3 = table.assign(3, "w2", TIMEOUT).unwrap();

        assert_eq!(table.cancel_worker("w1"), vec![1, 2]);

        assert_eq!(rx1.await.unwrap(), AssignmentOutcome::Cancelled);
        assert_eq!(rx2.await.unwrap(), AssignmentOutcome::Cancelled);
        assert_eq!(table.len(), 1);
        assert!(table.release(3, "w2"));

        // Nothing left to cancel
        assert!(table.cancel_worker("w1").is_empty());
    }

    #[tokio::test]
    async fn test_release_by_previous_owner_keeps_new_assignment() {
        let table = AssignmentTable::new();
        let _rx = table.assign(4, "w1", TIMEOUT).unwrap();
        table.cancel_worker("w1");

        let rx = table.assign(4, "w2", TIMEOUT).unwrap();
        assert!(!table.release(4, "w1"));

        assert!(table.resolve(4, "w2", success(7)));
        assert_eq!(rx.await.unwrap(), AssignmentOutcome::Replied(success(7)));
    }
}
