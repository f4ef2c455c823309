//! WebSocket handler — one chat session per connection.
//!
//! DESIGN
//! ======
//! On upgrade, the handler builds a `ChatSession` for the (user, peer) pair
//! and enters a `select!` loop:
//! - Incoming client text → parse send command → session send → echo the
//!   optimistic copy back to the sender
//! - Channel events from the peer's session → apply to the local list →
//!   forward to the client
//!
//! The loop is the session's single serialized update path: every mutation
//! of the session-local message list happens here, whether it originated
//! from user input or from the network.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → open session (resolve, hydrate, subscribe)
//! 2. Send `history` once with the hydrated list
//! 3. Relay sends and deliveries until either side closes
//! 4. Teardown → session close releases the channel subscription

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::message::{ChatEvent, ChatMessage};
use crate::session::ChatSession;
use crate::state::AppState;

// =============================================================================
// WIRE TYPES
// =============================================================================

/// Client → server command. The only inbound operation is a send.
#[derive(Debug, Deserialize)]
struct SendCommand {
    content: String,
}

/// Server → client frames, tagged the same way as channel events so a
/// relayed `message` and an echoed optimistic copy look identical.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "lowercase")]
enum Outbound {
    History(Vec<ChatMessage>),
    Message(ChatMessage),
    Error(ErrorBody),
}

#[derive(Debug, Clone, Serialize)]
struct ErrorBody {
    message: String,
}

impl Outbound {
    fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorBody { message: message.into() })
    }
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let (user_id, user_name, peer_id) = match parse_participants(&params) {
        Ok(parts) => parts,
        Err(reason) => return (StatusCode::BAD_REQUEST, reason).into_response(),
    };

    ws.on_upgrade(move |socket| run_ws(socket, state, user_id, user_name, peer_id))
}

/// Extract and validate the participant identity query parameters.
fn parse_participants(params: &HashMap<String, String>) -> Result<(Uuid, String, Uuid), &'static str> {
    let user_id: Uuid = params
        .get("user_id")
        .and_then(|s| s.parse().ok())
        .ok_or("user_id required")?;
    let peer_id: Uuid = params
        .get("peer_id")
        .and_then(|s| s.parse().ok())
        .ok_or("peer_id required")?;
    if user_id == peer_id {
        return Err("cannot open a chat with yourself");
    }
    let name = params
        .get("name")
        .map(String::as_str)
        .filter(|n| !n.trim().is_empty())
        .ok_or("name required")?;
    Ok((user_id, name.to_string(), peer_id))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, user_id: Uuid, user_name: String, peer_id: Uuid) {
    let mut session = ChatSession::new(state.store.clone(), state.hub.clone(), user_id, user_name, peer_id);

    // Resolution failure is the one fatal error: without a conversation the
    // chat cannot open at all.
    let mut events = match session.open().await {
        Ok(rx) => rx,
        Err(e) => {
            error!(error = %e, %user_id, %peer_id, "ws: session open failed");
            let _ = send_outbound(&mut socket, &Outbound::error("unable to open chat")).await;
            return;
        }
    };

    info!(%user_id, %peer_id, "ws: chat session connected");

    if send_outbound(&mut socket, &Outbound::History(session.messages().to_vec()))
        .await
        .is_err()
    {
        session.close();
        return;
    }

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        if let Some(reply) = handle_client_text(&mut session, &text) {
                            if send_outbound(&mut socket, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(event) = events.recv() => {
                session.apply_event(event.clone());
                let ChatEvent::Message(msg) = event;
                if send_outbound(&mut socket, &Outbound::Message(msg)).await.is_err() {
                    break;
                }
            }
        }
    }

    session.close();
    info!(%user_id, "ws: chat session disconnected");
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Process one inbound text frame and return the frame owed to the sender,
/// if any. Split from the socket loop so tests can exercise the send path
/// without a live socket.
fn handle_client_text(session: &mut ChatSession, text: &str) -> Option<Outbound> {
    let command: SendCommand = match serde_json::from_str(text) {
        Ok(cmd) => cmd,
        Err(e) => {
            warn!(error = %e, "ws: invalid inbound command");
            return Some(Outbound::error(format!("invalid json: {e}")));
        }
    };

    // A rejected send (blank content, session not ready) owes the client
    // nothing: no entry was created, so there is nothing to echo.
    session
        .send(&command.content)
        .map(Outbound::Message)
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_outbound(socket: &mut WebSocket, frame: &Outbound) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize outbound frame");
            return Err(());
        }
    };
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
