//! Axum router construction for the overlay server.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::OverlayState;
use crate::ws;

/// Build the overlay router.
///
/// - `GET /health` -- liveness probe
/// - `GET /ws/frames` -- `WebSocket` frame stream
/// - `GET /api/frame` -- latest frame
/// - `GET /api/layout` -- decoration placements
///
/// CORS allows any origin: the renderer is usually loaded from the
/// streaming software's browser source, not from this server.
pub fn build_router(state: Arc<OverlayState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/ws/frames", get(ws::ws_frames))
        .route("/api/frame", get(handlers::get_frame))
        .route("/api/layout", get(handlers::get_layout))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
