//! Worker API Handlers

use axum::{Json, extract::State};
use ethml_core::dto::worker::WorkerSummary;

use crate::state::AppState;

/// GET /api/workers
/// List connected workers in connection order
pub async fn list_workers(State(state): State<AppState>) -> Json<Vec<WorkerSummary>> {
    let workers = state.dispatcher.registry().snapshot().await;

    Json(workers.into_iter().map(WorkerSummary::from).collect())
}
