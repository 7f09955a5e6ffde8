//! Engine binary for the Shoal aquarium overlay.
//!
//! Wires the simulation to its collaborators and the renderer, then runs
//! the overlay loop until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `shoal-config.yaml` (defaults if missing)
//! 2. Initialize structured logging (tracing)
//! 3. Connect to the automation controller over NATS
//! 4. Create the config service client
//! 5. Subscribe to triggers and config pushes
//! 6. Start the overlay frame server
//! 7. Run the overlay loop
//! 8. Log the result

mod error;
mod frame_sink;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use shoal_bridge::{HttpConfigApi, NatsController};
use shoal_core::{AppConfig, Collaborators, Inbound, Simulation, run_overlay};
use shoal_overlay::{OverlayState, ServerConfig, spawn_server};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::frame_sink::OverlaySink;

/// Default configuration file, relative to the working directory.
const CONFIG_PATH: &str = "shoal-config.yaml";
/// Buffered inbound messages before the controller link waits on the loop.
const INBOUND_BUFFER: usize = 64;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any startup step or the overlay loop fails.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration. Logging is not up yet, so remember whether the
    //    file was there and report it below.
    let (config, found) = load_config(Path::new(CONFIG_PATH))?;

    // 2. Initialize structured logging. RUST_LOG wins over the config file.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!("shoal-engine starting");
    if found {
        info!(path = CONFIG_PATH, "configuration loaded");
    } else {
        warn!(path = CONFIG_PATH, "config file not found, using defaults");
    }
    info!(
        streamer = %config.streamer.key(),
        dock = ?config.scene.dock,
        tick_interval_ms = config.timing.tick_interval_ms,
        nats_url = config.infrastructure.nats_url,
        config_api_url = config.infrastructure.config_api_url,
        "overlay configured"
    );

    // 3. Connect to the automation controller.
    let streamer = config.streamer.key();
    let request_timeout = Duration::from_millis(config.timing.roster_timeout_ms);
    let controller =
        NatsController::connect(&config.infrastructure.nats_url, &streamer, request_timeout)
            .await?;

    // 4. Config service client (also serves skin lookups).
    let config_api = HttpConfigApi::new(&config.infrastructure.config_api_url, request_timeout)?;

    // 5. Inbound pushes.
    let (trigger_tx, trigger_rx) = mpsc::channel(INBOUND_BUFFER);
    let (push_tx, push_rx) = mpsc::channel(INBOUND_BUFFER);
    let trigger_task = controller.forward_triggers(trigger_tx).await?;
    let push_task = controller.forward_config_pushes(push_tx).await?;

    // 6. Overlay frame server.
    let overlay_state = Arc::new(OverlayState::new());
    let server_config = ServerConfig {
        host: config.infrastructure.overlay_host.clone(),
        port: config.infrastructure.overlay_port,
    };
    let (addr, server_task) = spawn_server(&server_config, Arc::clone(&overlay_state)).await?;
    info!(%addr, "renderer endpoint ready");

    // 7. Run the overlay.
    let mut sim = Simulation::new(config, SmallRng::from_os_rng())?;
    let mut sink = OverlaySink::new(overlay_state);
    let collaborators = Collaborators {
        roster: controller.clone(),
        skins: config_api.clone(),
        config: config_api,
        winners: controller,
    };
    let inbound = Inbound {
        triggers: trigger_rx,
        config_pushes: push_rx,
    };
    let result = run_overlay(&mut sim, collaborators, inbound, &mut sink, shutdown_signal()).await?;

    // 8. Log the result.
    trigger_task.abort();
    push_task.abort();
    server_task.abort();
    info!(
        ticks = result.ticks,
        final_tick = result.final_summary.as_ref().map(|s| s.tick),
        "shoal-engine shutdown complete"
    );

    Ok(())
}

/// Load configuration from `path`, falling back to defaults when the file
/// does not exist. Returns whether the file was found.
fn load_config(path: &Path) -> Result<(AppConfig, bool), EngineError> {
    if path.exists() {
        Ok((AppConfig::from_file(path)?, true))
    } else {
        // Still honor environment overrides.
        Ok((AppConfig::parse("")?, false))
    }
}

/// Resolves on `Ctrl-C`. If the signal handler cannot be installed the
/// engine runs until killed.
async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
