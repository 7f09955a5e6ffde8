//! Render-facing projections of the simulation.
//!
//! A [`SceneFrame`] is produced after every tick and handed to the render
//! adapter. Decoration placements are computed locally from the scene seed
//! and are never part of what the configuration service transmits.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{
    ConnectionState, DepthLayer, DockPosition, EffectKind, EventKind, Facing, LifecycleStage,
};
use crate::ids::{DecorationId, EventId, SkinId, ViewerKey};

/// A point in scene coordinates (both axes span `0.0..=100.0` by default).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Point {
    /// Create a point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(self, other: Self) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Whether both coordinates are finite numbers.
    pub const fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// One creature as the renderer draws it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct EntityView {
    /// Audience identity.
    pub identity: ViewerKey,
    /// Name drawn under the creature.
    pub display_name: String,
    /// Skin asset.
    pub skin: SkinId,
    /// Current position.
    pub position: Point,
    /// Sprite facing.
    pub facing: Facing,
    /// Lifecycle stage (drives entry/exit/death animations).
    pub stage: LifecycleStage,
    /// Kind of event holding the creature, if any.
    pub claimed_by: Option<EventKind>,
    /// Whether the creature is pinned in place by an event.
    pub frozen: bool,
    /// Active speech bubble text.
    pub speech: Option<String>,
}

/// The predator drawn during a predation event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AttackerView {
    /// Current position (may be off-scene).
    pub position: Point,
    /// Sprite facing.
    pub facing: Facing,
}

/// One active event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct EventView {
    /// Event identifier.
    pub id: EventId,
    /// Event kind.
    pub kind: EventKind,
    /// Current phase name (`approach`, `strike`, `running`, ...).
    pub phase: String,
    /// Participant identities.
    pub participants: Vec<ViewerKey>,
    /// The predator, for predation events.
    pub attacker: Option<AttackerView>,
}

/// A transient visual effect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct EffectView {
    /// Effect kind.
    pub kind: EffectKind,
    /// Where the effect is drawn.
    pub position: Point,
    /// Remaining lifetime in milliseconds.
    pub remaining_ms: u64,
}

/// Placement of one decoration instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct DecorationPlacement {
    /// Decoration asset.
    pub asset_id: DecorationId,
    /// Horizontal position as a percentage of the scene width.
    pub horizontal_percent: f64,
    /// Rendered size in pixels.
    pub size_px: u32,
    /// Draw order relative to creatures.
    pub depth_layer: DepthLayer,
}

/// Everything the renderer needs to draw one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct SceneFrame {
    /// Tick number.
    pub tick: u64,
    /// Simulated milliseconds since start.
    pub now_ms: u64,
    /// Controller link state; the renderer shows a banner when disconnected.
    pub connection: ConnectionState,
    /// Dock position of the overlay.
    pub dock: DockPosition,
    /// Version of the applied broadcaster config, if any.
    pub config_version: Option<u64>,
    /// Creatures, ordered by identity.
    pub entities: Vec<EntityView>,
    /// Active events.
    pub events: Vec<EventView>,
    /// Live effects.
    pub effects: Vec<EffectView>,
}
