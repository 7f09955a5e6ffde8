//! Overlay server lifecycle.
//!
//! [`spawn_server`] binds eagerly, so a port conflict fails engine startup
//! instead of surfacing later in a background task, then serves on a
//! spawned Tokio task.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::router::build_router;
use crate::state::OverlayState;

/// Where the overlay server listens.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: 8090,
        }
    }
}

/// Errors starting the overlay server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The configured address is not a socket address.
    #[error("invalid address {address}: {reason}")]
    Address {
        /// The rejected address.
        address: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Binding the listener failed.
    #[error("bind failed on {addr}: {source}")]
    Bind {
        /// Address that could not be bound.
        addr: SocketAddr,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Bind the listener and serve the overlay API on a background task.
///
/// # Errors
///
/// Returns [`ServerError`] if the address is invalid or cannot be bound.
pub async fn spawn_server(
    config: &ServerConfig,
    state: Arc<OverlayState>,
) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
    let address = format!("{}:{}", config.host, config.port);
    let addr: SocketAddr = address.parse().map_err(|e: std::net::AddrParseError| ServerError::Address {
        address: address.clone(),
        reason: e.to_string(),
    })?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    let bound = listener.local_addr().unwrap_or(addr);
    info!(addr = %bound, "overlay server listening");

    let router = build_router(state);
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!(error = %e, "overlay server exited with error");
        }
    });
    Ok((bound, handle))
}
