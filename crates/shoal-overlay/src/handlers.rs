//! REST endpoint handlers for the overlay server.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Liveness probe |
//! | `GET` | `/api/frame` | Latest scene frame (404 before the first tick) |
//! | `GET` | `/api/layout` | Current decoration placements |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use shoal_types::{DecorationPlacement, SceneFrame};

use crate::error::OverlayError;
use crate::state::OverlayState;

/// Liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// The most recent scene frame.
pub async fn get_frame(
    State(state): State<Arc<OverlayState>>,
) -> Result<Json<SceneFrame>, OverlayError> {
    state
        .latest
        .read()
        .await
        .clone()
        .map(Json)
        .ok_or_else(|| OverlayError::NotFound {
            what: "no frame has been produced yet".to_owned(),
        })
}

/// The current decoration layout.
pub async fn get_layout(State(state): State<Arc<OverlayState>>) -> Json<Vec<DecorationPlacement>> {
    Json(state.layout())
}
