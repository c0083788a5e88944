//! Dispatcher
//!
//! Drains the task queue into connected workers.
//!
//! Each dequeued job runs in its own tokio task: pick a worker, record the
//! assignment, send the job, wait for the reply under a deadline, then hand
//! the prediction to the settlement submitter. Every failed attempt puts the
//! job back on the queue. A task only ends Failed when the ledger will not
//! take its result: retries exhausted, or an outright refusal.
//!
//! The worker channel handlers call back into the dispatcher through
//! `worker_connected`, `worker_heartbeat`, `handle_result` and
//! `worker_disconnected`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ethml_core::domain::job::{Job, JobOutcome};
use ethml_core::domain::settlement::Prediction;
use ethml_core::domain::task::{FailureReason, TaskId, TaskStatus};
use ethml_core::domain::worker::{Worker, WorkerId, WorkerStatus};
use ethml_core::dto::channel::ServerMessage;
use ethml_core::error::{DispatchError, SettlementError};
use tokio_util::sync::CancellationToken;

use crate::ledger::Ledger;
use crate::repository::TaskStore;
use crate::service::assignment::{AssignmentOutcome, AssignmentTable};
use crate::service::queue::TaskQueue;
use crate::service::registry::{WorkerRegistry, WorkerSender};
use crate::service::settlement::{RetryPolicy, SettlementOutcome, SettlementSubmitter};

/// Timing knobs of the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// How long a worker has to reply to a dispatch
    pub reply_timeout: Duration,
    /// Heartbeat age after which a worker is evicted
    pub heartbeat_timeout: Duration,
    /// How often the reaper looks for stale workers
    pub reap_interval: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            reply_timeout: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(15),
            reap_interval: Duration::from_secs(5),
        }
    }
}

/// What happened to a job after one pass through the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobDisposition {
    /// Result settled, task Completed
    Completed,
    /// Settlement exhausted or refused, task Failed
    Failed,
    /// Attempt failed, job back on the queue
    Requeued,
    /// Duplicate attempt for a task already in flight, dropped
    Skipped,
}

/// Picks the worker for a task: `task_id mod n` over the available workers
///
/// Pure function of its inputs; returns `None` for an empty slice.
pub fn select_worker(task_id: TaskId, available: &[WorkerId]) -> Option<&WorkerId> {
    if available.is_empty() {
        return None;
    }

    let index = (task_id % available.len() as u64) as usize;
    available.get(index)
}

pub struct Dispatcher {
    registry: Arc<WorkerRegistry>,
    queue: Arc<TaskQueue>,
    assignments: Arc<AssignmentTable>,
    settlement: Arc<SettlementSubmitter>,
    store: Arc<dyn TaskStore>,
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn TaskStore>,
        ledger: Arc<dyn Ledger>,
        settings: DispatchSettings,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            registry: Arc::new(WorkerRegistry::new()),
            queue: Arc::new(TaskQueue::new(store.clone())),
            assignments: Arc::new(AssignmentTable::new()),
            settlement: Arc::new(SettlementSubmitter::new(ledger, store.clone(), policy)),
            store,
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<WorkerRegistry> {
        &self.registry
    }

    pub fn queue(&self) -> &Arc<TaskQueue> {
        &self.queue
    }

    pub fn assignments(&self) -> &Arc<AssignmentTable> {
        &self.assignments
    }

    pub fn settlement(&self) -> &Arc<SettlementSubmitter> {
        &self.settlement
    }

    // =============================================================================
    // Drain Loop
    // =============================================================================

    /// Drains the queue until `cancel` fires
    ///
    /// Waits for at least one connected worker before each dequeue, so an
    /// empty pool parks the loop instead of spinning jobs through requeue.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        tracing::info!("Dispatcher started");

        loop {
            if !self.registry.wait_for_worker(&cancel).await {
                break;
            }

            let Some(job) = self.queue.dequeue(&cancel).await else {
                break;
            };

            let dispatcher = Arc::clone(&self);
            tokio::spawn(async move {
                dispatcher.process(job).await;
            });
        }

        tracing::info!("Dispatcher stopped");
    }

    /// Runs one job to a disposition
    pub async fn process(&self, job: Job) -> JobDisposition {
        let task_id = job.task_id;

        match self.settlement.is_settled(task_id).await {
            Ok(true) => {
                tracing::info!(task_id, "Task already settled, completing without dispatch");
                self.set_status(task_id, TaskStatus::Completed, None).await;
                return JobDisposition::Completed;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(task_id, error = %e, "Could not read settlement record");
            }
        }

        let prediction = match self.dispatch(&job).await {
            Ok(prediction) => prediction,
            Err(e) if !e.should_requeue() => {
                tracing::debug!(task_id, error = %e, "Dropping duplicate attempt");
                return JobDisposition::Skipped;
            }
            Err(e) => {
                tracing::warn!(task_id, error = %e, "Dispatch attempt failed, requeueing");
                self.queue.requeue(job).await;
                return JobDisposition::Requeued;
            }
        };

        match self.settlement.submit(task_id, prediction).await {
            Ok(outcome) => {
                if outcome == SettlementOutcome::AlreadySettled {
                    tracing::debug!(task_id, "Result was already on the ledger");
                }
                self.set_status(task_id, TaskStatus::Completed, None).await;
                JobDisposition::Completed
            }
            Err(SettlementError::Store(e)) => {
                tracing::warn!(task_id, error = %e, "Settlement record unavailable, requeueing");
                self.queue.requeue(job).await;
                JobDisposition::Requeued
            }
            Err(e) => {
                let reason = match &e {
                    SettlementError::Refused { .. } => FailureReason::LedgerRefused,
                    _ => FailureReason::SettlementFailed,
                };
                tracing::error!(task_id, error = %e, reason = %reason, "Settlement failed, task marked Failed");
                self.set_status(task_id, TaskStatus::Failed, Some(reason))
                    .await;
                JobDisposition::Failed
            }
        }
    }

    /// One bounded request/reply round with a worker
    ///
    /// On every exit path the assignment is gone from the table and the
    /// worker's counter is back where it started.
    pub async fn dispatch(&self, job: &Job) -> Result<Prediction, DispatchError> {
        let available = self.registry.list_available().await;
        let worker_id = select_worker(job.task_id, &available)
            .ok_or(DispatchError::NoWorkersAvailable)?
            .clone();

        let reply = self
            .assignments
            .assign(job.task_id, &worker_id, self.settings.reply_timeout)?;
        self.registry.begin_assignment(&worker_id).await;

        let result = self.await_reply(job, &worker_id, reply).await;

        self.assignments.release(job.task_id, &worker_id);
        self.registry.end_assignment(&worker_id).await;

        result
    }

    async fn await_reply(
        &self,
        job: &Job,
        worker_id: &WorkerId,
        reply: tokio::sync::oneshot::Receiver<AssignmentOutcome>,
    ) -> Result<Prediction, DispatchError> {
        self.set_status(job.task_id, TaskStatus::Dispatched, None)
            .await;

        self.registry
            .send(worker_id, ServerMessage::Dispatch(job.clone()))
            .await?;

        tracing::info!(task_id = job.task_id, worker_id = %worker_id, "Job dispatched");

        match tokio::time::timeout(self.settings.reply_timeout, reply).await {
            Ok(Ok(AssignmentOutcome::Replied(JobOutcome::Success {
                prediction,
                confidence,
            }))) => {
                tracing::info!(
                    task_id = job.task_id,
                    worker_id = %worker_id,
                    prediction,
                    confidence,
                    "Worker replied"
                );
                Ok(Prediction {
                    prediction,
                    confidence,
                })
            }
            Ok(Ok(AssignmentOutcome::Replied(JobOutcome::Failure { error }))) => {
                Err(DispatchError::PredictorFailure(error))
            }
            Ok(Ok(AssignmentOutcome::Cancelled)) | Ok(Err(_)) => {
                Err(DispatchError::WorkerDisconnected(worker_id.clone()))
            }
            Err(_) => Err(DispatchError::WorkerTimeout {
                worker_id: worker_id.clone(),
                timeout: self.settings.reply_timeout,
            }),
        }
    }

    async fn set_status(&self, task_id: TaskId, status: TaskStatus, reason: Option<FailureReason>) {
        if let Err(e) = self.store.set_status(task_id, status, reason).await {
            tracing::error!(task_id, status = %status, error = %e, "Failed to persist task status");
        }
    }

    // =============================================================================
    // Worker Channel Hooks
    // =============================================================================

    /// A worker opened its channel
    pub async fn worker_connected(&self, worker_id: WorkerId, sender: WorkerSender) -> Worker {
        self.registry.register(worker_id, sender).await
    }

    /// A worker reported its status; `false` if it is no longer registered
    pub async fn worker_heartbeat(&self, worker_id: &str, status: WorkerStatus) -> bool {
        let known = self.registry.update_status(worker_id, status).await;
        if !known {
            tracing::debug!(worker_id = %worker_id, "Heartbeat from unregistered worker");
        }
        known
    }

    /// A worker replied to a dispatch; `false` if the reply was dropped
    pub fn handle_result(&self, worker_id: &str, task_id: TaskId, outcome: JobOutcome) -> bool {
        let accepted = self.assignments.resolve(task_id, worker_id, outcome);
        if !accepted {
            tracing::warn!(task_id, worker_id = %worker_id, "Ignoring reply without a live assignment");
        }
        accepted
    }

    /// A worker's channel closed
    ///
    /// Returns the tasks whose assignments were cancelled. Their dispatch
    /// attempts requeue them.
    pub async fn worker_disconnected(&self, worker_id: &str) -> Vec<TaskId> {
        self.registry.unregister(worker_id).await;

        let cancelled = self.assignments.cancel_worker(worker_id);
        if !cancelled.is_empty() {
            tracing::warn!(worker_id = %worker_id, tasks = ?cancelled, "Worker left with jobs in flight");
        }
        cancelled
    }

    // =============================================================================
    // Reaper
    // =============================================================================

    /// Evicts workers with stale heartbeats and cancels their assignments
    pub async fn reap_stale_workers(&self, now: DateTime<Utc>) -> Vec<WorkerId> {
        let evicted = self
            .registry
            .mark_dead_if_stale(now, self.settings.heartbeat_timeout)
            .await;

        for worker_id in &evicted {
            let cancelled = self.assignments.cancel_worker(worker_id);
            if !cancelled.is_empty() {
                tracing::warn!(worker_id = %worker_id, tasks = ?cancelled, "Cancelled assignments of stale worker");
            }
        }

        evicted
    }

    /// Runs `reap_stale_workers` every `reap_interval` until cancelled
    pub async fn run_reaper(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.settings.reap_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.reap_stale_workers(Utc::now()).await;
                }
                _ = cancel.cancelled() => {
                    tracing::info!("Reaper stopped");
                    break;
                }
            }
        }
    }
}
