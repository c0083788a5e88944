//! Execution service
//!
//! Runs dispatched jobs through the predictor under the local job timeout
//! and keeps the active job count reported in heartbeats.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use ethml_core::domain::job::{Job, JobOutcome};
use tracing::{info, warn};

use crate::service::predictor::Predictor;

/// Service trait for executing dispatched jobs
#[async_trait]
pub trait ExecutionService: Send + Sync {
    /// Executes a job and produces the reply for the dispatcher
    ///
    /// Never fails: predictor errors and timeouts become failure outcomes.
    async fn execute(&self, job: &Job) -> JobOutcome;

    /// Jobs currently executing
    fn active_jobs(&self) -> u32;
}

/// Standard implementation of ExecutionService
pub struct StandardExecutionService {
    predictor: Arc<dyn Predictor>,
    job_timeout: Duration,
    active: AtomicU32,
}

impl StandardExecutionService {
    pub fn new(predictor: Arc<dyn Predictor>, job_timeout: Duration) -> Self {
        Self {
            predictor,
            job_timeout,
            active: AtomicU32::new(0),
        }
    }
}

/// Decrements the active counter on every exit path
struct ActiveGuard<'a>(&'a AtomicU32);

impl<'a> ActiveGuard<'a> {
    fn enter(counter: &'a AtomicU32) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ExecutionService for StandardExecutionService {
    async fn execute(&self, job: &Job) -> JobOutcome {
        let _active = ActiveGuard::enter(&self.active);

        info!(
            "Running model {} for task {} on {}",
            job.model_id, job.task_id, job.data_point
        );

        let predict = self.predictor.predict(job.model_id, &job.data_point);
        match tokio::time::timeout(self.job_timeout, predict).await {
            Ok(Ok(prediction)) => {
                info!(
                    "Task {} predicted {} (confidence {})",
                    job.task_id, prediction.prediction, prediction.confidence
                );
                JobOutcome::Success {
                    prediction: prediction.prediction,
                    confidence: prediction.confidence,
                }
            }
            Ok(Err(e)) => {
                warn!("Prediction for task {} failed: {:#}", job.task_id, e);
                JobOutcome::failure(format!("{:#}", e))
            }
            Err(_) => {
                warn!(
                    "Prediction for task {} exceeded {:?}",
                    job.task_id, self.job_timeout
                );
                JobOutcome::failure(format!("Prediction timed out after {:?}", self.job_timeout))
            }
        }
    }

    fn active_jobs(&self) -> u32 {
        self.active.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use ethml_core::domain::settlement::Prediction;
    use ethml_core::domain::task::ModelId;
    use tokio::sync::Notify;

    /// Echoes the model id, or waits for a release signal first
    struct FakePredictor {
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl Predictor for FakePredictor {
        async fn predict(&self, model_id: ModelId, data_point: &str) -> Result<Prediction> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if data_point == "bad" {
                anyhow::bail!("model_{}.py exited with 1", model_id);
            }
            Ok(Prediction {
                prediction: model_id as i64 * 100,
                confidence: 0.75,
            })
        }
    }

    fn job(data_point: &str) -> Job {
        Job {
            task_id: 4,
            model_id: 3,
            data_point: data_point.to_string(),
        }
    }

    #[tokio::test]
    async fn test_execute_success() {
        let service =
            StandardExecutionService::new(Arc::new(FakePredictor { gate: None }), Duration::from_secs(1));

        let outcome = service.execute(&job("QmPoint")).await;
        assert_eq!(
            outcome,
            JobOutcome::Success {
                prediction: 300,
                confidence: 0.75
            }
        );
        assert_eq!(service.active_jobs(), 0);
    }

    #[tokio::test]
    async fn test_execute_predictor_error_is_failure() {
        let service =
            StandardExecutionService::new(Arc::new(FakePredictor { gate: None }), Duration::from_secs(1));

        let outcome = service.execute(&job("bad")).await;
        assert!(matches!(outcome, JobOutcome::Failure { ref error } if error.contains("exited with 1")));
        assert_eq!(service.active_jobs(), 0);
    }

    #[tokio::test]
    async fn test_execute_timeout_is_failure() {
        let gate = Arc::new(Notify::new());
        let service = StandardExecutionService::new(
            Arc::new(FakePredictor { gate: Some(gate) }),
            Duration::from_millis(20),
        );

        let outcome = service.execute(&job("QmPoint")).await;
        assert!(matches!(outcome, JobOutcome::Failure { ref error } if error.contains("timed out")));
        assert_eq!(service.active_jobs(), 0);
    }

    #[tokio::test]
    async fn test_active_jobs_counts_running_predictions() {
        let gate = Arc::new(Notify::new());
        let service = Arc::new(StandardExecutionService::new(
            Arc::new(FakePredictor {
                gate: Some(gate.clone()),
            }),
            Duration::from_secs(5),
        ));

        let running = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.execute(&job("QmPoint")).await })
        };

        while service.active_jobs() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(service.active_jobs(), 1);

        gate.notify_one();
        assert!(running.await.unwrap().is_success());
        assert_eq!(service.active_jobs(), 0);
    }
}
