//! Error types for the overlay HTTP layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors returned by overlay handlers.
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    /// Nothing to serve yet.
    #[error("not found: {what}")]
    NotFound {
        /// What was asked for.
        what: String,
    },
}

impl IntoResponse for OverlayError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
        };
        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });
        (status, axum::Json(body)).into_response()
    }
}
