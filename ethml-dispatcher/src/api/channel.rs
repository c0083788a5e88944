//! Worker Channel
//!
//! WebSocket endpoint the worker agents connect to.
//!
//! One connection is one worker. The dispatcher assigns the worker id, sends
//! it in a `welcome` frame, and from then on pushes `dispatch` frames while
//! the agent sends `status` and `result` frames back.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use ethml_core::dto::channel::{AgentMessage, ServerMessage};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::service::Dispatcher;
use crate::state::AppState;

/// GET /ws
/// Upgrades the connection to the worker channel
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.dispatcher))
}

/// Manage one worker connection after upgrade
///
/// Registers the worker, spawns a sender task that serializes outbound
/// messages onto the socket, processes inbound frames on the current task,
/// and unregisters the worker when the socket closes.
async fn handle_socket(socket: WebSocket, dispatcher: Arc<Dispatcher>) {
    let worker_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(worker_id = %worker_id, "Worker connected");

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let (mut sink, mut stream) = socket.split();

    // Welcome goes first so the agent knows its id before any dispatch
    let _ = tx.send(ServerMessage::Welcome {
        worker_id: worker_id.clone(),
    });
    dispatcher.worker_connected(worker_id.clone(), tx).await;

    // Sender task: forward channel messages to the WebSocket sink
    let sender_worker_id = worker_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(worker_id = %sender_worker_id, error = %e, "Failed to encode message");
                    continue;
                }
            };

            if sink.send(Message::Text(text.into())).await.is_err() {
                tracing::debug!(worker_id = %sender_worker_id, "WebSocket sink closed");
                break;
            }
        }
    });

    // Receiver loop: process inbound frames
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !handle_frame(&dispatcher, &worker_id, text.as_str()).await {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(worker_id = %worker_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(worker_id = %worker_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Clean up: unregister, cancel in-flight assignments, stop the sender
    dispatcher.worker_disconnected(&worker_id).await;
    send_task.abort();
    tracing::info!(worker_id = %worker_id, "Worker disconnected");
}

/// Applies one inbound frame; `false` means the connection should close
async fn handle_frame(dispatcher: &Dispatcher, worker_id: &str, text: &str) -> bool {
    let msg = match serde_json::from_str::<AgentMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::warn!(worker_id = %worker_id, error = %e, "Ignoring malformed frame");
            return true;
        }
    };

    match msg {
        AgentMessage::Status(status) => {
            // An evicted worker has to reconnect to get a fresh registration
            dispatcher.worker_heartbeat(worker_id, status).await
        }
        AgentMessage::Result { task_id, outcome } => {
            dispatcher.handle_result(worker_id, task_id, outcome);
            true
        }
    }
}
