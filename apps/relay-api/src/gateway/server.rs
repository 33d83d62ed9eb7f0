//! WebSocket upgrade endpoint and the per-session event loop behind it.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use banter_common::id::{prefix, prefixed_ulid};
use banter_common::proto::{event, ErrorPayload};
use banter_common::Frame;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time;

use crate::AppState;

/// Application close codes live in the 4000 range.
const CLOSE_IDLE_TIMEOUT: u16 = 4009;

#[derive(Debug, Deserialize)]
struct GatewayParams {
    #[serde(rename = "userId", default)]
    user_id: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/gateway", get(ws_upgrade))
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Query(params): Query<GatewayParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    // An empty userId is the same as none: an anonymous observer.
    let user_id = params.user_id.filter(|s| !s.is_empty());
    ws.on_upgrade(move |socket| handle_connection(socket, state, user_id))
}

async fn handle_connection(socket: WebSocket, state: AppState, user_id: Option<String>) {
    let connection_id = prefixed_ulid(prefix::CONNECTION);
    let (ws_tx, ws_rx) = socket.split();

    // Register before any presence broadcast so this session receives its
    // own onlineUsers frame.
    let outbound_rx = state.sessions.register(&connection_id, user_id.clone());

    tracing::info!(
        connection_id = %connection_id,
        user_id = user_id.as_deref().unwrap_or("anonymous"),
        "gateway session established"
    );

    if let Some(uid) = &user_id {
        match state.presence.mark_online(uid).await {
            Ok(()) => broadcast_online_users(&state).await,
            Err(e) => {
                tracing::warn!(?e, user_id = %uid, "presence registration failed");
                send_error(&state, &connection_id, "connect", "Presence registration failed");
            }
        }
    }

    run_session(&state, &connection_id, ws_tx, ws_rx, outbound_rx).await;

    state.sessions.remove(&connection_id);

    // Only the last session for a user flips them offline; parallel sessions
    // for the same user keep the presence key alive.
    if let Some(uid) = &user_id {
        if state.sessions.sessions_for_user(uid) == 0 {
            match state.presence.mark_offline(uid).await {
                Ok(()) => broadcast_online_users(&state).await,
                Err(e) => tracing::warn!(?e, user_id = %uid, "presence removal failed"),
            }
        }
    }

    tracing::info!(connection_id = %connection_id, "gateway session ended");
}

/// Main session event loop: read client frames, flush queued broadcasts,
/// enforce the keepalive.
async fn run_session(
    state: &AppState,
    connection_id: &str,
    mut ws_tx: futures_util::stream::SplitSink<WebSocket, Message>,
    mut ws_rx: futures_util::stream::SplitStream<WebSocket>,
    mut outbound_rx: mpsc::Receiver<Arc<str>>,
) {
    let mut ping_timer = time::interval(Duration::from_secs(state.config.ping_interval_secs));
    ping_timer.tick().await; // First tick fires immediately; skip it.
    let mut saw_traffic = true;

    loop {
        tokio::select! {
            // Client sends us a frame.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        saw_traffic = true;
                        let frame: Frame = match serde_json::from_str(&text) {
                            Ok(f) => f,
                            Err(e) => {
                                tracing::debug!(?e, connection_id, "unparseable frame");
                                send_error(state, connection_id, "unknown", "Invalid JSON frame");
                                continue;
                            }
                        };

                        // Commands run inline, so one session's commands are
                        // handled strictly in arrival order.
                        match state
                            .commands
                            .dispatch(state, connection_id, &frame.event, frame.data)
                            .await
                        {
                            Ok(true) => {}
                            Ok(false) => {
                                tracing::debug!(
                                    event = %frame.event,
                                    connection_id,
                                    "ignoring unknown gateway event"
                                );
                            }
                            Err(e) => {
                                tracing::warn!(
                                    ?e,
                                    event = %frame.event,
                                    connection_id,
                                    "command failed"
                                );
                                send_error(state, connection_id, &frame.event, e.public_message());
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        saw_traffic = true;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(?e, connection_id, "ws read error");
                        break;
                    }
                    _ => continue,
                }
            }

            // A frame queued for this session by the broadcaster.
            queued = outbound_rx.recv() => {
                match queued {
                    Some(payload) => {
                        if ws_tx.send(Message::Text(payload.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                    // Registry entry was dropped under us.
                    None => break,
                }
            }

            // Keepalive: a peer silent for two intervals is gone.
            _ = ping_timer.tick() => {
                if !saw_traffic {
                    tracing::debug!(connection_id, "idle timeout; closing connection");
                    let _ = send_close(&mut ws_tx, CLOSE_IDLE_TIMEOUT, "Idle timeout").await;
                    break;
                }
                saw_traffic = false;
                if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Push the current presence snapshot to every session.
async fn broadcast_online_users(state: &AppState) {
    match state.presence.list_online().await {
        Ok(mut online) => {
            online.sort();
            state.broadcast.broadcast_all(
                event::ONLINE_USERS,
                serde_json::to_value(online).unwrap_or_default(),
            );
        }
        Err(e) => tracing::warn!(?e, "failed to list online users"),
    }
}

/// Queue an `error` frame for one session.
fn send_error(state: &AppState, connection_id: &str, command: &str, message: &str) {
    let payload = ErrorPayload {
        command: command.to_string(),
        message: message.to_string(),
    };
    state.broadcast.send_to(
        connection_id,
        event::ERROR,
        serde_json::to_value(payload).unwrap_or_default(),
    );
}

/// Push a close frame carrying an application code and reason.
async fn send_close(
    ws_tx: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    code: u16,
    reason: &str,
) -> Result<(), axum::Error> {
    let close_msg = Message::Close(Some(axum::extract::ws::CloseFrame {
        code,
        reason: reason.to_string().into(),
    }));
    ws_tx.send(close_msg).await
}
