//! Enumeration types shared between the engine, the bridge, and the
//! overlay renderer.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Audience roles
// ---------------------------------------------------------------------------

/// A role an audience member holds in the streamer's channel.
///
/// Skin permissions are expressed as lists of roles; an identity may hold
/// several at once (a moderator who is also a subscriber).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Role {
    /// Any present viewer.
    Viewer,
    /// Paying subscriber.
    Subscriber,
    /// Channel VIP.
    Vip,
    /// Channel moderator.
    Moderator,
    /// The streamer themselves.
    Broadcaster,
}

impl Role {
    /// Parse a controller-supplied role label.
    ///
    /// Labels are matched case-insensitively; anything unrecognized is
    /// treated as a plain [`Role::Viewer`].
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "subscriber" | "sub" => Self::Subscriber,
            "vip" => Self::Vip,
            "moderator" | "mod" => Self::Moderator,
            "broadcaster" | "streamer" | "owner" => Self::Broadcaster,
            _ => Self::Viewer,
        }
    }
}

// ---------------------------------------------------------------------------
// Scene geometry
// ---------------------------------------------------------------------------

/// Horizontal facing of a creature sprite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Facing {
    /// Sprite faces toward decreasing x.
    Left,
    /// Sprite faces toward increasing x.
    Right,
}

impl Facing {
    /// The opposite facing.
    pub const fn flipped(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// Where the overlay is docked on the broadcast canvas.
///
/// Governs the safe vertical band creatures wander in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum DockPosition {
    /// Docked along the top edge.
    Top,
    /// Docked along the bottom edge.
    #[default]
    Bottom,
}

/// Draw order of a decoration relative to the creatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum DepthLayer {
    /// Drawn behind the creatures.
    Back,
    /// Drawn in front of the creatures.
    Front,
}

// ---------------------------------------------------------------------------
// Connectivity
// ---------------------------------------------------------------------------

/// State of the link to the local automation controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ConnectionState {
    /// Roster requests are being answered.
    Connected,
    /// The controller is unreachable; no new creatures are created.
    #[default]
    Disconnected,
}

// ---------------------------------------------------------------------------
// Entities and events
// ---------------------------------------------------------------------------

/// Render-facing lifecycle stage of a creature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum LifecycleStage {
    /// Playing the entry animation.
    Arriving,
    /// Free to roam or be claimed.
    Active,
    /// Playing the exit fade.
    Departing,
    /// Struck by a predator; playing the death animation.
    Dead,
    /// Awaiting purge from the registry.
    Removed,
}

/// Kind of choreographed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EventKind {
    /// A predator sweeps in and eats one creature.
    Predation,
    /// Two creatures meet in the middle and show affection.
    Pairing,
    /// Two creatures race across the scene.
    Race,
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Predation => f.write_str("predation"),
            Self::Pairing => f.write_str("pairing"),
            Self::Race => f.write_str("race"),
        }
    }
}

/// Kind of an inbound controller trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TriggerKind {
    /// Start a predation against one participant.
    Predation,
    /// Start a pairing between two participants.
    Pairing,
    /// Start a race between two participants.
    Race,
    /// Show a speech bubble over one participant.
    Speak,
}

/// Transient visual effect raised by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EffectKind {
    /// Burst at the spot where a predator struck.
    Bite,
    /// Hearts above a pairing midpoint.
    Hearts,
    /// Flag over a race winner.
    Finish,
}

/// How a two-participant synchronization wait resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum SyncOutcome {
    /// Both participants reached their marks before the deadline.
    Arrived,
    /// The deadline passed; the event proceeded anyway.
    TimedOut,
    /// A participant vanished while waiting.
    Cancelled,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn role_labels_parse_loosely() {
        assert_eq!(Role::from_label("MOD"), Role::Moderator);
        assert_eq!(Role::from_label(" Subscriber "), Role::Subscriber);
        assert_eq!(Role::from_label("founder-of-something"), Role::Viewer);
        assert_eq!(Role::from_label("broadcaster"), Role::Broadcaster);
    }

    #[test]
    fn facing_flips() {
        assert_eq!(Facing::Left.flipped(), Facing::Right);
        assert_eq!(Facing::Right.flipped(), Facing::Left);
    }

    #[test]
    fn defaults_match_overlay_startup() {
        assert_eq!(DockPosition::default(), DockPosition::Bottom);
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn event_kind_serializes_snake_case() {
        let json = serde_json::to_string(&EventKind::Predation).unwrap();
        assert_eq!(json, "\"predation\"");
    }
}
