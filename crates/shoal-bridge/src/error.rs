//! Error types for the bridge crate.
//!
//! [`BridgeError`] carries the transport-level detail; the simulation only
//! sees the coarser [`SourceError`] classification it converts into.

use shoal_core::SourceError;

/// Errors from the controller link or the config service.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Could not connect to the NATS server.
    #[error("failed to connect to NATS at {url}: {reason}")]
    Connect {
        /// Server URL.
        url: String,
        /// Underlying failure.
        reason: String,
    },

    /// Could not subscribe to a subject.
    #[error("failed to subscribe to {subject}: {reason}")]
    Subscribe {
        /// Subject.
        subject: String,
        /// Underlying failure.
        reason: String,
    },

    /// Could not publish to a subject.
    #[error("failed to publish to {subject}: {reason}")]
    Publish {
        /// Subject.
        subject: String,
        /// Underlying failure.
        reason: String,
    },

    /// Nobody is listening on the request subject: the controller is not
    /// running.
    #[error("no responders on {subject}")]
    NoResponders {
        /// Subject.
        subject: String,
    },

    /// A request got no reply in time.
    #[error("request on {subject} timed out after {timeout_ms} ms")]
    TimedOut {
        /// Subject or URL.
        subject: String,
        /// The deadline that passed.
        timeout_ms: u64,
    },

    /// Any other request failure.
    #[error("request on {subject} failed: {reason}")]
    Request {
        /// Subject.
        subject: String,
        /// Underlying failure.
        reason: String,
    },

    /// HTTP transport failure.
    #[error("HTTP request to {url} failed: {reason}")]
    Http {
        /// Request URL.
        url: String,
        /// Underlying failure.
        reason: String,
    },

    /// The config service answered with an error status.
    #[error("{url} returned status {status}")]
    Status {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// A payload could not be decoded.
    #[error("malformed {what}: {source}")]
    Decode {
        /// What was being decoded.
        what: &'static str,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// A payload could not be encoded.
    #[error("failed to encode {what}: {source}")]
    Encode {
        /// What was being encoded.
        what: &'static str,
        /// The underlying JSON error.
        source: serde_json::Error,
    },
}

impl From<BridgeError> for SourceError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::TimedOut { timeout_ms, .. } => Self::Timeout { timeout_ms },
            BridgeError::Decode { .. } => Self::Malformed {
                reason: error.to_string(),
            },
            BridgeError::Status { status, .. } if (400..500).contains(&status) => {
                Self::Malformed {
                    reason: error.to_string(),
                }
            }
            BridgeError::Connect { .. }
            | BridgeError::Subscribe { .. }
            | BridgeError::Publish { .. }
            | BridgeError::NoResponders { .. }
            | BridgeError::Request { .. }
            | BridgeError::Http { .. }
            | BridgeError::Status { .. }
            | BridgeError::Encode { .. } => Self::Unavailable {
                reason: error.to_string(),
            },
        }
    }
}
