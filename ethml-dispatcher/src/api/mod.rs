//! API Module
//!
//! HTTP API layer for the dispatcher.
//! Each submodule handles endpoints for a specific domain; `channel` serves
//! the worker WebSocket.

pub mod channel;
pub mod error;
pub mod health;
pub mod task;
pub mod worker;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Task intake endpoints
        .route("/api/tasks", post(task::submit_task))
        .route("/api/tasks/{id}", get(task::get_task))
        .route("/api/jobs", post(task::create_job))
        // Worker endpoints
        .route("/api/workers", get(worker::list_workers))
        .route("/ws", get(channel::ws_handler))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
