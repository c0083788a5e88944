//! Worker Registry
//!
//! Authoritative table of connected workers and their last reported status.
//!
//! All mutations go through a single `RwLock`, so concurrent heartbeats and
//! dispatches never interleave on one worker record. Workers are listed in
//! the order they connected, which keeps `task_id mod n` selection
//! reproducible.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ethml_core::domain::worker::{Worker, WorkerId, WorkerStatus};
use ethml_core::dto::channel::ServerMessage;
use ethml_core::error::DispatchError;
use tokio::sync::{Notify, RwLock, mpsc};
use tokio_util::sync::CancellationToken;

/// Outbound half of a worker's channel
pub type WorkerSender = mpsc::UnboundedSender<ServerMessage>;

struct WorkerEntry {
    worker: Worker,
    /// Connection order
    seq: u64,
    sender: WorkerSender,
}

#[derive(Default)]
struct RegistryState {
    workers: HashMap<WorkerId, WorkerEntry>,
    next_seq: u64,
}

/// Registry of connected workers
///
/// Designed to be wrapped in `Arc` and shared between connection handlers,
/// the dispatcher and the reaper.
#[derive(Default)]
pub struct WorkerRegistry {
    state: RwLock<RegistryState>,
    available: Notify,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a worker that just connected
    ///
    /// A worker registering again under the same id is moved to the end of
    /// the connection order and its assignment count starts from zero.
    pub async fn register(&self, worker_id: WorkerId, sender: WorkerSender) -> Worker {
        let worker = Worker::new(worker_id.clone());

        {
            let mut state = self.state.write().await;
            state.next_seq += 1;
            let seq = state.next_seq;
            state.workers.insert(
                worker_id.clone(),
                WorkerEntry {
                    worker: worker.clone(),
                    seq,
                    sender,
                },
            );
        }

        tracing::info!(worker_id = %worker_id, "Worker registered");
        self.available.notify_waiters();

        worker
    }

    /// Removes a worker, returning its last record
    pub async fn unregister(&self, worker_id: &str) -> Option<Worker> {
        let removed = self.state.write().await.workers.remove(worker_id);

        if removed.is_some() {
            tracing::info!(worker_id = %worker_id, "Worker unregistered");
        }

        removed.map(|entry| Worker {
            connected: false,
            ..entry.worker
        })
    }

    /// Records a heartbeat
    ///
    /// Returns `false` if the worker is not registered (e.g. it was evicted).
    pub async fn update_status(&self, worker_id: &str, status: WorkerStatus) -> bool {
        let mut state = self.state.write().await;

        match state.workers.get_mut(worker_id) {
            Some(entry) => {
                entry.worker.status = status.normalized();
                entry.worker.last_seen = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Connected workers in ascending connection order
    pub async fn list_available(&self) -> Vec<WorkerId> {
        let state = self.state.read().await;

        let mut connected: Vec<_> = state
            .workers
            .values()
            .filter(|entry| entry.worker.connected)
            .collect();
        connected.sort_by_key(|entry| entry.seq);

        connected
            .into_iter()
            .map(|entry| entry.worker.id.clone())
            .collect()
    }

    /// Evicts every worker whose last heartbeat is older than `timeout`
    ///
    /// Returns the evicted ids in connection order. The caller is responsible
    /// for cancelling assignments that point at them.
    pub async fn mark_dead_if_stale(&self, now: DateTime<Utc>, timeout: Duration) -> Vec<WorkerId> {
        let timeout = chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::MAX);
        let mut state = self.state.write().await;

        let mut stale: Vec<_> = state
            .workers
            .values()
            .filter(|entry| now.signed_duration_since(entry.worker.last_seen) > timeout)
            .map(|entry| (entry.seq, entry.worker.id.clone()))
            .collect();
        stale.sort();

        for (_, worker_id) in &stale {
            state.workers.remove(worker_id);
            tracing::warn!(worker_id = %worker_id, "Evicted worker with stale heartbeat");
        }

        stale.into_iter().map(|(_, id)| id).collect()
    }

    /// Waits until at least one worker is connected
    ///
    /// Returns `false` if `cancel` fired first.
    pub async fn wait_for_worker(&self, cancel: &CancellationToken) -> bool {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if !self.is_empty().await {
                return true;
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = cancel.cancelled() => return false,
            }
        }
    }

    /// Pushes a message onto a worker's channel
    pub async fn send(&self, worker_id: &str, message: ServerMessage) -> Result<(), DispatchError> {
        let state = self.state.read().await;

        let entry = state
            .workers
            .get(worker_id)
            .ok_or_else(|| DispatchError::WorkerDisconnected(worker_id.to_string()))?;

        entry
            .sender
            .send(message)
            .map_err(|_| DispatchError::WorkerDisconnected(worker_id.to_string()))
    }

    /// Counts one more live assignment against a worker
    pub async fn begin_assignment(&self, worker_id: &str) -> bool {
        let mut state = self.state.write().await;

        match state.workers.get_mut(worker_id) {
            Some(entry) => {
                entry.worker.assigned_jobs += 1;
                true
            }
            None => false,
        }
    }

    /// Releases one live assignment, if the worker is still registered
    pub async fn end_assignment(&self, worker_id: &str) {
        let mut state = self.state.write().await;

        if let Some(entry) = state.workers.get_mut(worker_id) {
            entry.worker.assigned_jobs = entry.worker.assigned_jobs.saturating_sub(1);
        }
    }

    /// Finds a worker record
    pub async fn get(&self, worker_id: &str) -> Option<Worker> {
        self.state
            .read()
            .await
            .workers
            .get(worker_id)
            .map(|entry| entry.worker.clone())
    }

    /// All worker records in connection order
    pub async fn snapshot(&self) -> Vec<Worker> {
        let state = self.state.read().await;

        let mut entries: Vec<_> = state.workers.values().collect();
        entries.sort_by_key(|entry| entry.seq);

        entries.into_iter().map(|entry| entry.worker.clone()).collect()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.workers.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.workers.is_empty()
    }
}
