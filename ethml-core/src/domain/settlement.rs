//! Settlement domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::task::TaskId;

/// A prediction accepted from a worker
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub prediction: i64,
    pub confidence: f64,
}

/// Guard against submitting the same task's result twice
///
/// Written once per task; never changed after `submitted` becomes true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub task_id: TaskId,
    pub prediction: i64,
    pub confidence: Option<f64>,
    pub submitted: bool,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl SettlementRecord {
    /// Record for a result the ledger now holds
    pub fn submitted(task_id: TaskId, prediction: Prediction) -> Self {
        Self {
            task_id,
            prediction: prediction.prediction,
            confidence: Some(prediction.confidence),
            submitted: true,
            submitted_at: Some(Utc::now()),
        }
    }
}
