//! Frame sink that feeds the overlay server.
//!
//! After each tick the frame is broadcast to every connected renderer and
//! stored for `GET /api/frame`. Layout changes replace the placements
//! served by `GET /api/layout`, synchronously and in order.

use std::sync::Arc;

use shoal_core::{FrameSink, TickSummary};
use shoal_overlay::OverlayState;
use shoal_types::{DecorationPlacement, SceneFrame};
use tracing::debug;

/// Sink bridging the overlay loop to the frame server.
pub struct OverlaySink {
    state: Arc<OverlayState>,
}

impl OverlaySink {
    /// Create a sink backed by the given server state.
    pub const fn new(state: Arc<OverlayState>) -> Self {
        Self { state }
    }
}

impl FrameSink for OverlaySink {
    fn on_frame(&mut self, summary: &TickSummary, frame: &SceneFrame) {
        let receivers = self.state.publish_frame(frame);
        if !summary.finished.is_empty() || summary.purged > 0 {
            debug!(
                tick = summary.tick,
                receivers,
                entities = summary.entities,
                finished = summary.finished.len(),
                purged = summary.purged,
                "frame published"
            );
        }
    }

    fn on_layout(&mut self, placements: &[DecorationPlacement]) {
        debug!(placements = placements.len(), "layout published");
        self.state.set_layout(placements.to_vec());
    }
}
