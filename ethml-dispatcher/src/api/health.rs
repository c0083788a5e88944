//! Health Check API Handler
//!
//! Liveness plus a few dispatch gauges for monitoring.

use axum::{Json, extract::State};
use ethml_core::dto::health::HealthStatus;

use crate::state::AppState;

/// GET /health
/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    let dispatcher = &state.dispatcher;

    Json(HealthStatus {
        status: "ok".to_string(),
        workers: dispatcher.registry().len().await,
        queued: dispatcher.queue().len(),
        in_flight: dispatcher.assignments().len(),
    })
}
