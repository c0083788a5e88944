//! Worker domain model
//!
//! Represents a connected compute node that executes jobs for the dispatcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque connection identifier assigned by the dispatcher
pub type WorkerId = String;

/// A worker connected to the dispatcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    /// Connection identifier
    pub id: WorkerId,

    /// Last status the worker reported about itself
    pub status: WorkerStatus,

    /// Number of live assignments the dispatcher holds against this worker
    pub assigned_jobs: u32,

    /// When the connection was established
    pub connected_at: DateTime<Utc>,

    /// Last time a heartbeat arrived
    pub last_seen: DateTime<Utc>,

    /// Whether the channel to this worker is open
    pub connected: bool,
}

impl Worker {
    pub fn new(id: WorkerId) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: WorkerStatus::default(),
            assigned_jobs: 0,
            connected_at: now,
            last_seen: now,
            connected: true,
        }
    }
}

/// Self-reported load figures sent with every heartbeat
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerStatus {
    /// CPU usage, percent (0..=100)
    pub cpu_load: f32,

    /// Memory usage, percent (0..=100)
    pub mem_load: f32,

    /// Jobs the agent is currently executing
    pub active_jobs: u32,
}

impl WorkerStatus {
    /// Creates a status with both loads clamped into 0..=100
    pub fn new(cpu_load: f32, mem_load: f32, active_jobs: u32) -> Self {
        Self {
            cpu_load,
            mem_load,
            active_jobs,
        }
        .normalized()
    }

    /// Clamps loads into 0..=100; NaN becomes 0
    pub fn normalized(self) -> Self {
        Self {
            cpu_load: clamp_percent(self.cpu_load),
            mem_load: clamp_percent(self.mem_load),
            active_jobs: self.active_jobs,
        }
    }
}

fn clamp_percent(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}
