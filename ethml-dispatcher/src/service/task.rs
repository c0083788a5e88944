//! Task Service
//!
//! Intake logic: create tasks on the ledger, queue them, read them back.

use ethml_core::domain::task::{Task, TaskId};
use ethml_core::dto::task::{CreateJob, SubmitTask, TaskCreated, TaskStatusResponse};
use ethml_core::error::LedgerError;

use crate::ledger::Ledger;
use crate::repository::{StoreError, TaskStore};
use crate::service::queue::TaskQueue;

/// Service error type
#[derive(Debug)]
pub enum TaskError {
    NotFound(TaskId),
    AlreadyExists(TaskId),
    ValidationError(String),
    Ledger(LedgerError),
    Store(StoreError),
}

impl From<StoreError> for TaskError {
    fn from(err: StoreError) -> Self {
        TaskError::Store(err)
    }
}

impl From<LedgerError> for TaskError {
    fn from(err: LedgerError) -> Self {
        TaskError::Ledger(err)
    }
}

/// Create a paid task on the ledger, then queue its job
pub async fn submit_task(
    ledger: &dyn Ledger,
    queue: &TaskQueue,
    req: SubmitTask,
) -> Result<TaskCreated, TaskError> {
    validate_data_point(&req.data_point)?;
    validate_tip(&req.tip)?;

    let task_id = ledger
        .request_prediction(req.model_id, &req.data_point, &req.tip)
        .await?;

    create_job(
        queue,
        CreateJob {
            task_id,
            model_id: req.model_id,
            data_point: req.data_point,
            tip: req.tip,
        },
    )
    .await
}

/// Queue a task the ledger already issued
pub async fn create_job(queue: &TaskQueue, req: CreateJob) -> Result<TaskCreated, TaskError> {
    validate_data_point(&req.data_point)?;
    validate_tip(&req.tip)?;

    let task = req.into_task();
    if !queue.submit(&task).await? {
        return Err(TaskError::AlreadyExists(task.task_id));
    }

    Ok(TaskCreated {
        task_id: task.task_id,
    })
}

/// Get a task plus the ledger's view of it
///
/// The ledger part is best effort: it is left out if the ledger cannot be
/// reached.
pub async fn get_task_status(
    store: &dyn TaskStore,
    ledger: &dyn Ledger,
    task_id: TaskId,
) -> Result<TaskStatusResponse, TaskError> {
    let task: Task = store
        .get_task(task_id)
        .await?
        .ok_or(TaskError::NotFound(task_id))?;

    let ledger = match ledger.get_task(task_id).await {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(task_id, error = %e, "Ledger lookup failed");
            None
        }
    };

    Ok(TaskStatusResponse { task, ledger })
}

// =============================================================================
// Validation
// =============================================================================

fn validate_data_point(data_point: &str) -> Result<(), TaskError> {
    if data_point.trim().is_empty() {
        return Err(TaskError::ValidationError(
            "data_point must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Tips are non-negative decimal amounts such as `0`, `1.5` or `.25`
fn validate_tip(tip: &str) -> Result<(), TaskError> {
    let mut parts = tip.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next().unwrap_or_default();

    let digits_only = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    let valid = !(whole.is_empty() && fraction.is_empty())
        && digits_only(whole)
        && digits_only(fraction)
        && !tip.ends_with('.');

    if !valid {
        return Err(TaskError::ValidationError(format!(
            "tip must be a non-negative decimal amount, got '{}'",
            tip
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::testing::ScriptedLedger;
    use crate::repository::MemoryTaskStore;
    use std::sync::Arc;

    fn setup() -> (TaskQueue, Arc<MemoryTaskStore>) {
        let store = Arc::new(MemoryTaskStore::new());
        (TaskQueue::new(store.clone()), store)
    }

    fn create(task_id: TaskId) -> CreateJob {
        CreateJob {
            task_id,
            model_id: 1,
            data_point: "QmPoint".to_string(),
            tip: "0.01".to_string(),
        }
    }

    #[test]
    fn test_validate_tip() {
        for ok in ["0", "10", "1.5", ".25", "0.000001"] {
            assert!(validate_tip(ok).is_ok(), "{} should be accepted", ok);
        }
        for bad in ["", ".", "-1", "1.", "1e3", "abc", "1.2.3"] {
            assert!(validate_tip(bad).is_err(), "{} should be rejected", bad);
        }
    }

    #[tokio::test]
    async fn test_submit_task_uses_ledger_task_id() {
        let (queue, store) = setup();
        let ledger = ScriptedLedger::new();

        let created = submit_task(
            &ledger,
            &queue,
            SubmitTask {
                model_id: 3,
                data_point: "QmInput".to_string(),
                tip: "0.5".to_string(),
            },
        )
        .await
        .unwrap();

        assert_eq!(created.task_id, 1);
        assert_eq!(queue.task_ids(), vec![1]);
        assert_eq!(store.get_task(1).await.unwrap().unwrap().model_id, 3);
    }

    #[tokio::test]
    async fn test_submit_task_ledger_down() {
        let (queue, _) = setup();
        let ledger = ScriptedLedger::unreachable();

        let err = submit_task(
            &ledger,
            &queue,
            SubmitTask {
                model_id: 3,
                data_point: "QmInput".to_string(),
                tip: "0.5".to_string(),
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, TaskError::Ledger(LedgerError::Transient(_))));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_create_job_conflict() {
        let (queue, _) = setup();
        create_job(&queue, create(4)).await.unwrap();

        let err = create_job(&queue, create(4)).await.unwrap_err();
        assert!(matches!(err, TaskError::AlreadyExists(4)));
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_create_job_rejects_empty_data_point() {
        let (queue, _) = setup();
        let mut req = create(4);
        req.data_point = "  ".to_string();

        let err = create_job(&queue, req).await.unwrap_err();
        assert!(matches!(err, TaskError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_get_task_status_with_and_without_ledger() {
        let (queue, store) = setup();
        create_job(&queue, create(4)).await.unwrap();

        let status = get_task_status(store.as_ref(), &ScriptedLedger::new(), 4)
            .await
            .unwrap();
        assert_eq!(status.task.task_id, 4);
        assert_eq!(status.ledger.unwrap()["task_id"], 4);

        let status = get_task_status(store.as_ref(), &ScriptedLedger::unreachable(), 4)
            .await
            .unwrap();
        assert!(status.ledger.is_none());

        let err = get_task_status(store.as_ref(), &ScriptedLedger::new(), 99)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::NotFound(99)));
    }
}
