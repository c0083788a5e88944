//! Worker DTOs
//!
//! Data transfer objects for worker listings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::worker::{Worker, WorkerStatus};

/// Summary information about a connected worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSummary {
    /// Connection identifier
    pub id: String,

    /// Last reported load
    pub status: WorkerStatus,

    /// Jobs the dispatcher currently has in flight on this worker
    pub assigned_jobs: u32,

    /// When the worker connected
    pub connected_at: DateTime<Utc>,

    /// Last heartbeat
    pub last_seen: DateTime<Utc>,
}

impl From<Worker> for WorkerSummary {
    fn from(worker: Worker) -> Self {
        WorkerSummary {
            id: worker.id,
            status: worker.status,
            assigned_jobs: worker.assigned_jobs,
            connected_at: worker.connected_at,
            last_seen: worker.last_seen,
        }
    }
}
