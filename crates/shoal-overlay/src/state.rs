//! Shared state for the overlay server.
//!
//! [`OverlayState`] holds the broadcast channel for scene frames, the
//! latest frame for REST reads, and the current decoration layout. The
//! layout lives in a `watch` channel: writes never wait and the last
//! write always wins.

use std::sync::Arc;

use shoal_types::{DecorationPlacement, SceneFrame};
use tokio::sync::{RwLock, broadcast, watch};

/// Capacity of the frame broadcast channel.
///
/// At 20 ticks per second this is a little over six seconds of frames. A
/// subscriber that falls further behind receives
/// [`broadcast::error::RecvError::Lagged`] and skips to the newest frame.
const BROADCAST_CAPACITY: usize = 128;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct OverlayState {
    /// Broadcast sender for scene frames.
    pub tx: broadcast::Sender<SceneFrame>,
    /// The most recent frame, if any tick has run.
    pub latest: Arc<RwLock<Option<SceneFrame>>>,
    /// Current decoration placements.
    pub layout: watch::Sender<Vec<DecorationPlacement>>,
}

impl OverlayState {
    /// Create an empty state.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            tx,
            latest: Arc::new(RwLock::new(None)),
            layout: watch::Sender::new(Vec::new()),
        }
    }

    /// Subscribe to the frame stream.
    pub fn subscribe(&self) -> broadcast::Receiver<SceneFrame> {
        self.tx.subscribe()
    }

    /// Publish a frame to all connected clients and remember it.
    ///
    /// Never blocks: if a handler holds the read lock the stored copy is
    /// left for the next tick to refresh. Returns the number of stream
    /// receivers (0 when no client is connected).
    pub fn publish_frame(&self, frame: &SceneFrame) -> usize {
        if let Ok(mut latest) = self.latest.try_write() {
            *latest = Some(frame.clone());
        }
        self.tx.send(frame.clone()).unwrap_or(0)
    }

    /// Replace the decoration layout.
    pub fn set_layout(&self, placements: Vec<DecorationPlacement>) {
        self.layout.send_replace(placements);
    }

    /// Copy of the current decoration layout.
    pub fn layout(&self) -> Vec<DecorationPlacement> {
        self.layout.borrow().clone()
    }
}

impl Default for OverlayState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use shoal_types::{ConnectionState, DockPosition};

    use super::*;

    fn frame(tick: u64) -> SceneFrame {
        SceneFrame {
            tick,
            now_ms: tick * 50,
            connection: ConnectionState::Connected,
            dock: DockPosition::Bottom,
            config_version: None,
            entities: Vec::new(),
            events: Vec::new(),
            effects: Vec::new(),
        }
    }

    #[tokio::test]
    async fn publish_without_clients_still_stores_latest() {
        let state = OverlayState::new();
        assert_eq!(state.publish_frame(&frame(1)), 0);
        assert_eq!(state.latest.read().await.as_ref().map(|f| f.tick), Some(1));
    }

    #[tokio::test]
    async fn subscribers_receive_frames_in_order() {
        let state = OverlayState::new();
        let mut rx = state.subscribe();
        state.publish_frame(&frame(1));
        state.publish_frame(&frame(2));
        assert_eq!(rx.recv().await.map(|f| f.tick).ok(), Some(1));
        assert_eq!(rx.recv().await.map(|f| f.tick).ok(), Some(2));
    }

    fn placement(asset: &str) -> DecorationPlacement {
        DecorationPlacement {
            asset_id: shoal_types::DecorationId::new(asset),
            horizontal_percent: 50.0,
            size_px: 64,
            depth_layer: shoal_types::DepthLayer::Back,
        }
    }

    #[test]
    fn last_layout_write_wins() {
        let state = OverlayState::new();
        assert!(state.layout().is_empty());
        state.set_layout(vec![placement("kelp")]);
        state.set_layout(vec![placement("rock"), placement("castle")]);
        let layout = state.layout();
        assert_eq!(layout.len(), 2);
        assert_eq!(layout.first().map(|p| p.asset_id.as_str()), Some("rock"));
    }

    #[tokio::test]
    async fn layout_watchers_see_the_newest_value() {
        let state = OverlayState::new();
        let mut rx = state.layout.subscribe();
        state.set_layout(vec![placement("kelp")]);
        state.set_layout(vec![placement("rock")]);
        rx.changed().await.unwrap();
        let seen = rx.borrow_and_update().clone();
        assert_eq!(seen, vec![placement("rock")]);
    }
}
