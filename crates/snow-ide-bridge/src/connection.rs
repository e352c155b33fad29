//! WebSocket connection handling (§4.10). Grounded on a prior agent runtime's
//! `ws/connection.rs` connection loop shape — `tokio::select!` over inbound
//! frames and outbound broadcast pushes — with the challenge/auth half of
//! that state machine removed (no handshake here, see crate docs) and the
//! method-dispatch half replaced by `IdeRequest`'s typed variants instead of
//! a prior agent runtime's untyped `method`/`params` envelope.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};

use snow_protocol::messages::{IdeRequest, IdeResponse};

use crate::analysis;
use crate::state::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: Arc<AppState>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    info!(conn_id = %conn_id, "IDE bridge client connected");

    let (mut tx, mut rx) = socket.split();
    let mut push_rx = state.subscribe_push();
    let mut command_rx = state.subscribe_commands();

    // Replay the last known context immediately so a client that connects
    // mid-session isn't left without one until the next editor event.
    if let Some(context) = state.last_context.lock().await.clone() {
        if send_frame(&mut tx, &context).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            msg = rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_query(&text, &state) {
                            if send_frame(&mut tx, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = tx.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!(conn_id, error = %e, "IDE bridge read error");
                        break;
                    }
                    _ => {}
                }
            }
            event = push_rx.recv() => {
                match event {
                    Ok(push) => {
                        if send_frame(&mut tx, &push).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            command = command_rx.recv() => {
                match command {
                    Ok(cmd) => {
                        if send_frame(&mut tx, &cmd).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    info!(conn_id, "IDE bridge client disconnected");
}

/// Decode and answer one of the four query variants the client can ask the
/// bridge (§4.10). `showDiff`/`closeDiff`/`showDiffReview`/`showGitDiff`
/// flow the other way — see [`AppState::show_diff`] and friends — so a
/// client sending one here gets logged and ignored rather than answered.
fn handle_query(text: &str, state: &AppState) -> Option<IdeResponse> {
    let request: IdeRequest = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "malformed IDE bridge frame, ignoring");
            return None;
        }
    };

    match request {
        IdeRequest::GetDiagnostics { file_path, request_id } => {
            Some(IdeResponse::Diagnostics { request_id, diagnostics: analysis::collect_diagnostics(&file_path) })
        }
        IdeRequest::AceGoToDefinition { file_path, line, column, request_id } => Some(IdeResponse::DefinitionResult {
            request_id,
            locations: analysis::go_to_definition(&state.workspace_folder, &file_path, line, column),
        }),
        IdeRequest::AceFindReferences { file_path, line, column, request_id } => Some(IdeResponse::ReferencesResult {
            request_id,
            locations: analysis::find_references(&state.workspace_folder, &file_path, line, column),
        }),
        IdeRequest::AceGetSymbols { file_path, request_id } => {
            Some(IdeResponse::SymbolsResult { request_id, symbols: analysis::extract_symbols(&file_path) })
        }
        other => {
            warn!(frame = ?other, "unexpected diff-command frame received from client, ignoring");
            None
        }
    }
}

async fn send_frame<T: serde::Serialize>(
    tx: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    frame: &T,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(frame).unwrap_or_default();
    tx.send(Message::Text(json.into())).await.map_err(axum::Error::new)
}
