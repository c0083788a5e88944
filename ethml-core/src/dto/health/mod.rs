//! Health DTOs

use serde::{Deserialize, Serialize};

/// Body of the dispatcher's `/health` endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    /// Connected workers
    pub workers: usize,
    /// Jobs waiting in the queue
    pub queued: usize,
    /// Jobs with a live assignment
    pub in_flight: usize,
}
