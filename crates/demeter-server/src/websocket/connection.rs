//! Socket connection lifecycle
//!
//! Each connection gets its own id and event feed. Client frames are
//! validated by the protocol module; command execution runs in a spawned
//! task so a slow command never blocks the event relay.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::Extension;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::state::ServerState;
use crate::websocket::protocol::{parse_request, ParsedRequest, ServerMessage};

/// Interval between server pings to keep idle connections alive
const PING_INTERVAL_SECS: u64 = 30;

/// WebSocket upgrade handler
pub async fn socket_handler(
    ws: WebSocketUpgrade,
    Extension(state): Extension<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle one socket connection until it closes.
async fn handle_socket(socket: WebSocket, state: Arc<ServerState>) {
    let conn_id = Uuid::new_v4();
    info!(connection = %conn_id, "Socket connection established");

    let (mut sender, mut receiver) = socket.split();
    let mut event_rx = state.register_connection(conn_id);
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<ServerMessage>();

    let mut ping = tokio::time::interval(Duration::from_secs(PING_INTERVAL_SECS));
    ping.tick().await; // first tick completes immediately

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_text(&text, &state, &reply_tx) {
                            if send_message(&mut sender, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sender.send(Message::Pong(data)).await;
                    }
                    Some(Err(e)) => {
                        error!(connection = %conn_id, error = %e, "Socket error");
                        break;
                    }
                    None => break,
                    _ => {}
                }
            }
            reply = reply_rx.recv() => {
                match reply {
                    Some(message) => {
                        if send_message(&mut sender, &message).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            event = event_rx.recv() => {
                match event {
                    Some(event) => {
                        let message = ServerMessage::event(&event);
                        if send_message(&mut sender, &message).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = ping.tick() => {
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    state.remove_connection(conn_id);
    info!(connection = %conn_id, "Socket connection closed");
}

/// Validate one text frame and start any work it requests.
///
/// Invalid frames get an immediate error reply. Commands execute in a
/// spawned task and answer through `reply_tx` when done.
fn handle_text(
    text: &str,
    state: &Arc<ServerState>,
    reply_tx: &mpsc::UnboundedSender<ServerMessage>,
) -> Option<ServerMessage> {
    match parse_request(text) {
        Ok(ParsedRequest::Command { id, spec }) => {
            debug!(request = %id, command = %spec.command, "Received socket command");
            let state = state.clone();
            let reply_tx = reply_tx.clone();
            tokio::spawn(async move {
                let reply = match state.execute_command(spec).await {
                    Ok(output) => ServerMessage::command_result(id, output),
                    Err(e) => ServerMessage::error(Some(id), e.to_string()),
                };
                let _ = reply_tx.send(reply);
            });
            None
        }
        Err(e) => {
            warn!(message = %e.message, "Rejected socket request");
            Some(ServerMessage::error(e.request_id, e.message))
        }
    }
}

async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    match serde_json::to_string(message) {
        Ok(json) => sender.send(Message::Text(json)).await,
        Err(e) => {
            error!(error = %e, "Failed to serialize socket message");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_state, EchoOrchestrator};
    use serde_json::json;

    #[tokio::test]
    async fn test_invalid_frame_gets_immediate_error() {
        let state = test_state();
        let (reply_tx, _reply_rx) = mpsc::unbounded_channel();

        let reply = handle_text("not json", &state, &reply_tx).unwrap();
        match reply {
            ServerMessage::Error { request_id, .. } => assert!(request_id.is_none()),
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_command_without_orchestrator_replies_not_ready() {
        let state = test_state();
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        let frame = json!({"id": id.to_string(), "type": "command", "command": "build"});

        let immediate = handle_text(&frame.to_string(), &state, &reply_tx);
        assert!(immediate.is_none());

        match reply_rx.recv().await.unwrap() {
            ServerMessage::Error {
                request_id,
                message,
            } => {
                assert_eq!(request_id, Some(id));
                assert_eq!(message, "server is not ready");
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_command_replies_with_result() {
        let state = test_state();
        state.attach(EchoOrchestrator::new()).await;
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        let frame = json!({
            "id": id.to_string(),
            "type": "command",
            "command": "test",
            "parameters": {"suite": "unit"},
        });

        assert!(handle_text(&frame.to_string(), &state, &reply_tx).is_none());

        match reply_rx.recv().await.unwrap() {
            ServerMessage::CommandResult {
                request_id, result, ..
            } => {
                assert_eq!(request_id, id);
                assert_eq!(result["command"], "test");
            }
            other => panic!("unexpected reply: {:?}", other),
        }
        state.close().await;
    }
}
