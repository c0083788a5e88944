use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Queue order for unsettled tasks
    sqlx::query("CREATE SEQUENCE IF NOT EXISTS task_queue_seq")
        .execute(pool)
        .await?;

    // Create tasks table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            task_id BIGINT PRIMARY KEY,
            model_id BIGINT NOT NULL,
            data_point TEXT NOT NULL,
            tip TEXT NOT NULL,
            status VARCHAR(50) NOT NULL,
            failure_reason VARCHAR(64),
            attempts INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL,
            queue_seq BIGINT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create settlement records table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settlement_records (
            task_id BIGINT PRIMARY KEY REFERENCES tasks(task_id) ON DELETE CASCADE,
            prediction BIGINT NOT NULL,
            confidence DOUBLE PRECISION,
            submitted BOOLEAN NOT NULL DEFAULT FALSE,
            submitted_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for queue restore
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_queue_seq ON tasks(queue_seq)")
        .execute(pool)
        .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
