//! WebSocket upgrade handler and per-connection event loop.

use std::time::Instant;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use proximity_common::id::{ConnectionId, PrefixedId};
use tokio::time;

use crate::error::ApiError;
use crate::AppState;

use super::events::{close_message, update_message, CLOSE_TIMEOUT};
use super::fanout::{self, Inbox};
use super::session::{RoomSession, SessionPhase};

/// Largest inbound frame accepted. A cursor frame is well under 256 bytes.
const MAX_FRAME_BYTES: usize = 4 * 1024;

/// Longest room name accepted in `/ws/{room}`.
const MAX_ROOM_NAME_LEN: usize = 64;

type WsSink = SplitSink<WebSocket, Message>;
type WsStream = SplitStream<WebSocket>;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws_default_room))
        .route("/ws/{room}", get(ws_named_room))
}

async fn ws_default_room(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let room = state.config.default_room.clone();
    upgrade(ws, state, room)
}

async fn ws_named_room(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(room): Path<String>,
) -> Response {
    if let Err(err) = validate_room_name(&room) {
        return err.into_response();
    }
    upgrade(ws, state, room)
}

pub(crate) fn validate_room_name(room: &str) -> Result<(), ApiError> {
    let valid = !room.is_empty()
        && room.len() <= MAX_ROOM_NAME_LEN
        && room
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(ApiError::bad_request(
            "Room names are 1-64 characters of [A-Za-z0-9._-]",
        ))
    }
}

fn upgrade(ws: WebSocketUpgrade, state: AppState, room: String) -> Response {
    ws.max_message_size(MAX_FRAME_BYTES)
        .max_frame_size(MAX_FRAME_BYTES)
        .on_upgrade(move |socket| handle_connection(socket, state, room))
        .into_response()
}

async fn handle_connection(socket: WebSocket, state: AppState, room: String) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbox, inbox) = fanout::outbox(state.config.outbound_queue_capacity);
    let mut session = RoomSession::new(ConnectionId::generate(), room, outbox);

    tracing::debug!(
        connection_id = %session.connection_id,
        room = %session.room,
        "room socket connected"
    );

    // Step 1: the first frame joins the room.
    let first = time::timeout(state.config.join_timeout, next_frame(&mut ws_rx)).await;
    let bytes = match first {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            tracing::debug!(connection_id = %session.connection_id, "closed before first frame");
            return;
        }
        Err(_timeout) => {
            let _ = ws_tx.send(close_message(CLOSE_TIMEOUT, "Join timeout")).await;
            return;
        }
    };

    if let Err(err) = session.handle_frame(&state.rooms, &bytes) {
        tracing::info!(
            connection_id = %session.connection_id,
            room = %session.room,
            error = %err,
            "room join rejected"
        );
        let _ = ws_tx.send(close_message(err.close_code(), &err.to_string())).await;
        return;
    }

    tracing::info!(
        connection_id = %session.connection_id,
        room = %session.room,
        peer_id = session.peer_id().unwrap_or_default(),
        "room session established"
    );

    // Step 2: pump frames both ways until either side goes away.
    run_session(&mut session, &state, ws_tx, ws_rx, inbox).await;

    session.close();
    tracing::info!(
        connection_id = %session.connection_id,
        room = %session.room,
        "room session ended"
    );
}

/// Wait for the next data frame, skipping control frames. `None` once the
/// client closes or the socket errors.
async fn next_frame(ws_rx: &mut WsStream) -> Option<Vec<u8>> {
    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Text(text)) => return Some(text.as_str().as_bytes().to_vec()),
            Ok(Message::Binary(bytes)) => return Some(bytes.to_vec()),
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => return None,
            Err(e) => {
                tracing::debug!(?e, "ws read error before join");
                return None;
            }
        }
    }
    None
}

/// Main session loop: apply client frames, forward room events, enforce liveness.
async fn run_session(
    session: &mut RoomSession,
    state: &AppState,
    mut ws_tx: WsSink,
    mut ws_rx: WsStream,
    mut inbox: Inbox,
) {
    let mut ping_timer = time::interval(state.config.ping_interval);
    ping_timer.tick().await; // First tick fires immediately; skip it.
    let mut last_seen = Instant::now();

    while session.phase() == SessionPhase::Joined {
        tokio::select! {
            // Client sends us a frame.
            msg = ws_rx.next() => {
                let bytes = match msg {
                    Some(Ok(Message::Text(text))) => text.as_str().as_bytes().to_vec(),
                    Some(Ok(Message::Binary(bytes))) => bytes.to_vec(),
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        last_seen = Instant::now();
                        continue;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(?e, connection_id = %session.connection_id, "ws read error");
                        break;
                    }
                };

                last_seen = Instant::now();
                if let Err(err) = session.handle_frame(&state.rooms, &bytes) {
                    tracing::info!(
                        connection_id = %session.connection_id,
                        error = %err,
                        "closing room session"
                    );
                    let _ = ws_tx.send(close_message(err.close_code(), &err.to_string())).await;
                    break;
                }
            }

            // Room event from the fanout queue.
            update = inbox.recv() => {
                // The room holds the only sender, so `None` means we are no
                // longer subscribed.
                let Some(update) = update else { break };
                let msg = match update_message(&update) {
                    Ok(msg) => msg,
                    Err(e) => {
                        tracing::error!(?e, "failed to encode room event");
                        continue;
                    }
                };
                if ws_tx.send(msg).await.is_err() {
                    break;
                }
            }

            // Liveness check.
            _ = ping_timer.tick() => {
                if last_seen.elapsed() > state.config.idle_timeout {
                    tracing::debug!(
                        connection_id = %session.connection_id,
                        "idle timeout, closing connection"
                    );
                    let _ = ws_tx.send(close_message(CLOSE_TIMEOUT, "Idle timeout")).await;
                    break;
                }
                if ws_tx.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
            }
        }
    }
}
