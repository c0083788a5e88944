//! Worker channel protocol
//!
//! JSON text frames exchanged over the WebSocket between the dispatcher and a
//! worker agent. Every frame carries a `type` tag.

use serde::{Deserialize, Serialize};

use crate::domain::job::{Job, JobOutcome};
use crate::domain::task::TaskId;
use crate::domain::worker::{WorkerId, WorkerStatus};

/// Dispatcher -> agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First frame on a new connection, tells the agent its identifier
    Welcome { worker_id: WorkerId },

    /// Run this job and reply with a `result` frame
    Dispatch(Job),
}

/// Agent -> dispatcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentMessage {
    /// Periodic heartbeat
    Status(WorkerStatus),

    /// Reply to a dispatch
    Result { task_id: TaskId, outcome: JobOutcome },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dispatch_frame_shape() {
        let msg = ServerMessage::Dispatch(Job {
            task_id: 4,
            model_id: 2,
            data_point: "QmPoint".to_string(),
        });

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({"type": "dispatch", "task_id": 4, "model_id": 2, "data_point": "QmPoint"})
        );
    }

    #[test]
    fn test_parse_status_frame() {
        let raw = r#"{"type":"status","cpu_load":12.5,"mem_load":40.0,"active_jobs":1}"#;
        let msg: AgentMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg, AgentMessage::Status(WorkerStatus::new(12.5, 40.0, 1)));
    }

    #[test]
    fn test_parse_result_frames() {
        let ok = r#"{"type":"result","task_id":4,"outcome":{"status":"success","prediction":358,"confidence":0.9}}"#;
        let msg: AgentMessage = serde_json::from_str(ok).unwrap();
        assert_eq!(
            msg,
            AgentMessage::Result {
                task_id: 4,
                outcome: JobOutcome::Success {
                    prediction: 358,
                    confidence: 0.9
                }
            }
        );

        let failed = r#"{"type":"result","task_id":5,"outcome":{"status":"failure","error":"model missing"}}"#;
        let msg: AgentMessage = serde_json::from_str(failed).unwrap();
        assert_eq!(
            msg,
            AgentMessage::Result {
                task_id: 5,
                outcome: JobOutcome::failure("model missing")
            }
        );
    }

    #[test]
    fn test_unknown_frame_is_rejected() {
        let raw = r#"{"type":"training_task","task_id":1}"#;
        assert!(serde_json::from_str::<AgentMessage>(raw).is_err());
    }
}
