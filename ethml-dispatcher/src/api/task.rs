//! Task API Handlers
//!
//! HTTP endpoints for task intake and status.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use ethml_core::domain::task::TaskId;
use ethml_core::dto::task::{CreateJob, SubmitTask, TaskCreated, TaskStatusResponse};

use crate::api::error::ApiResult;
use crate::service::task_service;
use crate::state::AppState;

/// POST /api/tasks
/// Create a paid task on the ledger and queue it
pub async fn submit_task(
    State(state): State<AppState>,
    Json(req): Json<SubmitTask>,
) -> ApiResult<(StatusCode, Json<TaskCreated>)> {
    tracing::info!("Submitting task for model: {}", req.model_id);

    let created =
        task_service::submit_task(state.ledger.as_ref(), state.dispatcher.queue(), req).await?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// POST /api/jobs
/// Queue a task the ledger already issued
pub async fn create_job(
    State(state): State<AppState>,
    Json(req): Json<CreateJob>,
) -> ApiResult<(StatusCode, Json<TaskCreated>)> {
    tracing::info!("Creating job for task: {}", req.task_id);

    let created = task_service::create_job(state.dispatcher.queue(), req).await?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/tasks/{id}
/// Get task status, with the ledger's view when reachable
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
) -> ApiResult<Json<TaskStatusResponse>> {
    tracing::debug!("Getting task: {}", id);

    let status =
        task_service::get_task_status(state.store.as_ref(), state.ledger.as_ref(), id).await?;

    Ok(Json(status))
}
