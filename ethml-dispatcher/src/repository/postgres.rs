//! Postgres Task Store
//!
//! Handles all database operations related to tasks and settlements.

use async_trait::async_trait;
use ethml_core::domain::job::Job;
use ethml_core::domain::settlement::SettlementRecord;
use ethml_core::domain::task::{FailureReason, Task, TaskId, TaskStatus};
use sqlx::PgPool;

use super::{Result, StoreError, TaskStore};

/// Task store backed by the dispatcher's Postgres database
#[derive(Debug, Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn insert_task(&self, task: &Task) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO tasks (task_id, model_id, data_point, tip, status, attempts,
                               created_at, updated_at, queue_seq)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, nextval('task_queue_seq'))
            ON CONFLICT (task_id) DO NOTHING
            "#,
        )
        .bind(task.task_id as i64)
        .bind(task.model_id as i64)
        .bind(&task.data_point)
        .bind(&task.tip)
        .bind(status_to_string(task.status))
        .bind(task.attempts as i32)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_task(&self, task_id: TaskId) -> Result<Option<Task>> {
        let row = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT task_id, model_id, data_point, tip, status, failure_reason,
                   attempts, created_at, updated_at
            FROM tasks
            WHERE task_id = $1
            "#,
        )
        .bind(task_id as i64)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn set_status(
        &self,
        task_id: TaskId,
        status: TaskStatus,
        reason: Option<FailureReason>,
    ) -> Result<()> {
        let now = chrono::Utc::now();

        let query = match status {
            TaskStatus::Pending => {
                r#"
                UPDATE tasks
                SET status = $1, failure_reason = $2, updated_at = $3,
                    queue_seq = nextval('task_queue_seq')
                WHERE task_id = $4
                "#
            }
            TaskStatus::Dispatched => {
                r#"
                UPDATE tasks
                SET status = $1, failure_reason = $2, updated_at = $3,
                    attempts = attempts + 1
                WHERE task_id = $4
                "#
            }
            TaskStatus::Completed | TaskStatus::Failed => {
                r#"
                UPDATE tasks
                SET status = $1, failure_reason = $2, updated_at = $3
                WHERE task_id = $4
                "#
            }
        };

        let result = sqlx::query(query)
            .bind(status_to_string(status))
            .bind(reason.map(|r| r.as_str()))
            .bind(now)
            .bind(task_id as i64)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::TaskNotFound(task_id));
        }

        Ok(())
    }

    async fn unsettled_jobs(&self) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT task_id, model_id, data_point
            FROM tasks
            WHERE status IN ('Pending', 'Dispatched')
            ORDER BY queue_seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn get_settlement(&self, task_id: TaskId) -> Result<Option<SettlementRecord>> {
        let row = sqlx::query_as::<_, SettlementRow>(
            r#"
            SELECT task_id, prediction, confidence, submitted, submitted_at
            FROM settlement_records
            WHERE task_id = $1
            "#,
        )
        .bind(task_id as i64)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn record_settlement(&self, record: &SettlementRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settlement_records (task_id, prediction, confidence, submitted, submitted_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (task_id) DO UPDATE
            SET prediction = EXCLUDED.prediction,
                confidence = EXCLUDED.confidence,
                submitted = EXCLUDED.submitted,
                submitted_at = EXCLUDED.submitted_at
            WHERE settlement_records.submitted = FALSE
            "#,
        )
        .bind(record.task_id as i64)
        .bind(record.prediction)
        .bind(record.confidence)
        .bind(record.submitted)
        .bind(record.submitted_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn status_to_string(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "Pending",
        TaskStatus::Dispatched => "Dispatched",
        TaskStatus::Completed => "Completed",
        TaskStatus::Failed => "Failed",
    }
}

fn string_to_status(s: &str) -> TaskStatus {
    match s {
        "Pending" => TaskStatus::Pending,
        "Dispatched" => TaskStatus::Dispatched,
        "Completed" => TaskStatus::Completed,
        "Failed" => TaskStatus::Failed,
        _ => TaskStatus::Pending,
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct TaskRow {
    task_id: i64,
    model_id: i64,
    data_point: String,
    tip: String,
    status: String,
    failure_reason: Option<String>,
    attempts: i32,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Task {
            task_id: row.task_id as TaskId,
            model_id: row.model_id as u64,
            data_point: row.data_point,
            tip: row.tip,
            status: string_to_status(&row.status),
            failure_reason: row.failure_reason.as_deref().and_then(FailureReason::parse),
            attempts: row.attempts.max(0) as u32,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct JobRow {
    task_id: i64,
    model_id: i64,
    data_point: String,
}

impl From<JobRow> for Job {
    fn from(row: JobRow) -> Self {
        Job {
            task_id: row.task_id as TaskId,
            model_id: row.model_id as u64,
            data_point: row.data_point,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SettlementRow {
    task_id: i64,
    prediction: i64,
    confidence: Option<f64>,
    submitted: bool,
    submitted_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<SettlementRow> for SettlementRecord {
    fn from(row: SettlementRow) -> Self {
        SettlementRecord {
            task_id: row.task_id as TaskId,
            prediction: row.prediction,
            confidence: row.confidence,
            submitted: row.submitted,
            submitted_at: row.submitted_at,
        }
    }
}
