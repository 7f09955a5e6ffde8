//! Network clients for the Shoal overlay's external collaborators.
//!
//! - [`controller`] -- NATS link to the local automation controller:
//!   roster request/reply, trigger and config-push forwarding, race winners.
//! - [`config_api`] -- HTTP client for the broadcaster config service and
//!   the batched skin lookup.
//! - [`subjects`] -- Subject naming and payload decoding.
//! - [`error`] -- [`BridgeError`] and its [`SourceError`] classification.
//!
//! [`BridgeError`]: error::BridgeError
//! [`SourceError`]: shoal_core::SourceError

pub mod config_api;
pub mod controller;
pub mod error;
pub mod subjects;

pub use config_api::HttpConfigApi;
pub use controller::NatsController;
pub use error::BridgeError;
