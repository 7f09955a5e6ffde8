//! Overlay frame server for the Shoal aquarium overlay.
//!
//! The browser renderer is a thin client: it draws whatever the engine
//! last produced. This crate serves that output:
//!
//! - **`WebSocket` endpoint** (`/ws/frames`) streaming every
//!   [`SceneFrame`] via [`tokio::sync::broadcast`], skipping ahead when a
//!   client lags
//! - **REST endpoints** for the latest frame, the decoration layout, and a
//!   health probe
//!
//! # Architecture
//!
//! The engine writes into [`OverlayState`] after each tick and never waits
//! on a reader; handlers serve the latest copy.
//!
//! [`SceneFrame`]: shoal_types::SceneFrame
//! [`OverlayState`]: state::OverlayState

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

pub use router::build_router;
pub use server::{ServerConfig, ServerError, spawn_server};
pub use state::OverlayState;
