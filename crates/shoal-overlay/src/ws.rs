//! `WebSocket` handler for real-time scene frame streaming.
//!
//! Clients connect to `GET /ws/frames` and receive one JSON-encoded
//! [`SceneFrame`] per tick. A client that falls behind skips the frames
//! it missed and resumes from the newest one; the renderer only ever
//! needs the latest state.
//!
//! [`SceneFrame`]: shoal_types::SceneFrame

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::state::OverlayState;

/// Upgrade to a `WebSocket` and begin streaming frames.
///
/// # Route
///
/// `GET /ws/frames`
pub async fn ws_frames(
    ws: WebSocketUpgrade,
    State(state): State<Arc<OverlayState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| stream_frames(socket, state))
}

async fn stream_frames(mut socket: WebSocket, state: Arc<OverlayState>) {
    debug!("renderer connected");

    let mut rx = state.subscribe();

    loop {
        tokio::select! {
            result = rx.recv() => match result {
                Ok(frame) => {
                    let json = match serde_json::to_string(&frame) {
                        Ok(json) => json,
                        Err(error) => {
                            warn!(%error, tick = frame.tick, "failed to serialize frame");
                            continue;
                        }
                    };
                    if socket.send(Message::Text(json.into())).await.is_err() {
                        debug!("renderer disconnected (send failed)");
                        return;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "renderer lagged, skipping ahead");
                }
                Err(RecvError::Closed) => {
                    debug!("frame channel closed");
                    return;
                }
            },
            msg = socket.recv() => match msg {
                Some(Ok(Message::Close(_))) | None => {
                    debug!("renderer disconnected");
                    return;
                }
                Some(Ok(Message::Ping(data))) => {
                    if socket.send(Message::Pong(data)).await.is_err() {
                        return;
                    }
                }
                Some(Err(error)) => {
                    debug!(%error, "websocket error");
                    return;
                }
                Some(Ok(_)) => {}
            },
        }
    }
}
