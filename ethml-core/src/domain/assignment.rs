//! Assignment domain type

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::task::TaskId;
use crate::domain::worker::WorkerId;

/// A job in flight on a worker
///
/// Lives only between sending the job and the reply, timeout, or worker
/// disconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub task_id: TaskId,
    pub worker_id: WorkerId,
    pub sent_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

impl Assignment {
    pub fn new(task_id: TaskId, worker_id: WorkerId, reply_timeout: std::time::Duration) -> Self {
        let sent_at = Utc::now();
        let timeout = chrono::Duration::from_std(reply_timeout).unwrap_or(chrono::Duration::MAX);
        Self {
            task_id,
            worker_id,
            sent_at,
            deadline: sent_at.checked_add_signed(timeout).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_deadline_is_sent_at_plus_timeout() {
        let assignment = Assignment::new(1, "w".to_string(), Duration::from_secs(30));
        assert_eq!(
            assignment.deadline - assignment.sent_at,
            chrono::Duration::seconds(30)
        );
    }
}
