use crate::error::AppError;
use crate::extractors::{bearer_token, TokenQuery};
use crate::models::events::{ClientEvent, ServerEvent};
use crate::models::guest::ConnectionId;
use crate::services::EventSink;
use crate::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::{interval, timeout};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Upgrade to the realtime channel. The token is checked before the upgrade.
pub async fn handle_websocket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<TokenQuery>,
    headers: HeaderMap,
) -> Response {
    let Some(token) = bearer_token(&headers, params.token.as_deref()) else {
        return AppError::Authentication("missing token".to_string()).into_response();
    };

    if let Err(e) = state.gateway.authenticate(&token).await {
        warn!("Rejected websocket upgrade: {}", e);
        return e.into_response();
    }

    let connection_id = Uuid::new_v4();
    let max_message_size = state.config.websocket.max_message_size_bytes;

    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| handle_websocket_stream(socket, state, connection_id, token))
}

async fn handle_websocket_stream(
    socket: WebSocket,
    state: AppState,
    connection_id: ConnectionId,
    token: String,
) {
    // register first so events emitted during admission are buffered
    let mut receiver: broadcast::Receiver<String> = state.hub.register(connection_id).await;

    let guest = match state.gateway.on_connect(connection_id, &token).await {
        Ok(guest) => guest,
        Err(e) => {
            warn!("Admission failed for connection {}: {}", connection_id, e);
            state.hub.unregister(&connection_id).await;
            return;
        }
    };

    let (mut sender, mut recv) = socket.split();

    let max_message_size = state.config.websocket.max_message_size_bytes;
    let heartbeat_interval = Duration::from_secs(state.config.websocket.heartbeat_interval_seconds);
    let connection_timeout = Duration::from_secs(state.config.websocket.connection_timeout_seconds);

    let last_pong = Arc::new(Mutex::new(Instant::now()));
    let (ping_tx, mut ping_rx) = mpsc::unbounded_channel::<()>();

    let heartbeat_last_pong = last_pong.clone();
    let mut heartbeat_task = tokio::spawn(async move {
        let mut ticker = interval(heartbeat_interval);
        loop {
            ticker.tick().await;
            if heartbeat_last_pong.lock().await.elapsed() > heartbeat_interval * 3 {
                warn!("WebSocket heartbeat timeout for connection {}", connection_id);
                break;
            }
            if ping_tx.send(()).is_err() {
                break;
            }
        }
    });

    let mut send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                result = receiver.recv() => {
                    match result {
                        Ok(frame) => {
                            if sender.send(Message::Text(frame)).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(
                                "Connection {} lagged, {} events dropped",
                                connection_id, skipped
                            );
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                Some(()) = ping_rx.recv() => {
                    if sender.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let recv_state = state.clone();
    let recv_last_pong = last_pong.clone();
    let mut recv_task = tokio::spawn(async move {
        loop {
            let msg = match timeout(connection_timeout, recv.next()).await {
                Ok(Some(Ok(msg))) => msg,
                Ok(Some(Err(e))) => {
                    debug!("WebSocket error on connection {}: {}", connection_id, e);
                    break;
                }
                Ok(None) => break,
                Err(_) => {
                    warn!("WebSocket receive timeout for connection {}", connection_id);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    if text.len() > max_message_size {
                        warn!(
                            "Message size {} exceeds limit {} on connection {}",
                            text.len(),
                            max_message_size,
                            connection_id
                        );
                        reply_error(&recv_state, &connection_id, "Message too large").await;
                        break;
                    }

                    match serde_json::from_str::<ClientEvent>(&text) {
                        Ok(event) => recv_state.gateway.dispatch(&connection_id, event).await,
                        Err(e) => {
                            debug!("Invalid event on connection {}: {}", connection_id, e);
                            reply_error(&recv_state, &connection_id, "Invalid event").await;
                        }
                    }
                }
                Message::Pong(_) => {
                    *recv_last_pong.lock().await = Instant::now();
                }
                Message::Close(_) => break,
                // axum answers pings itself
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
            heartbeat_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
            heartbeat_task.abort();
        }
        _ = &mut heartbeat_task => {
            send_task.abort();
            recv_task.abort();
        }
    }

    state.gateway.on_disconnect(&connection_id).await;
    state.hub.unregister(&connection_id).await;
    info!("Closed connection {} for guest {}", connection_id, guest.id);
}

async fn reply_error(state: &AppState, connection_id: &ConnectionId, message: &str) {
    let event = ServerEvent::Error {
        message: message.to_string(),
    };
    if let Err(e) = state.hub.send_to(connection_id, &event).await {
        debug!("Could not report error to {}: {}", connection_id, e);
    }
}
