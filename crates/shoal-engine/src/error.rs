//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure that can stop startup or the
//! overlay loop, so `main` can propagate with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: shoal_core::config::ConfigError,
    },

    /// The simulation could not be built.
    #[error("simulation error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: shoal_core::TickError,
    },

    /// The overlay loop failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: shoal_core::RunnerError,
    },

    /// The controller link or config service client failed.
    #[error("bridge error: {source}")]
    Bridge {
        /// The underlying bridge error.
        #[from]
        source: shoal_bridge::BridgeError,
    },

    /// The overlay frame server failed to start.
    #[error("overlay server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: shoal_overlay::ServerError,
    },
}
