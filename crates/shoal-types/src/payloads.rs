//! Wire payloads exchanged with external collaborators.
//!
//! - [`RosterEntry`] -- one present audience member, as reported by the
//!   local automation controller.
//! - [`OverlayConfig`] -- the broadcaster's versioned overlay settings,
//!   delivered by poll and by push.
//! - [`TriggerMessage`] -- an inbound request to start an event.
//! - [`RaceWinnerReport`] -- the single outbound message, sent when a race
//!   concludes.
//!
//! Field names follow the controller's camelCase JSON convention.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Role, TriggerKind};
use crate::ids::{DecorationId, EventId, SkinId, ViewerKey};

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

/// One audience member currently present in the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct RosterEntry {
    /// Stable identity (login name).
    pub identity: ViewerKey,
    /// Name shown under the creature; falls back to the identity.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Channel role label as reported by the controller.
    #[serde(default)]
    pub display_role: String,
    /// Whether the identity is a subscriber (independent of its role).
    #[serde(default)]
    pub subscription_flag: bool,
}

impl RosterEntry {
    /// Build an entry for a plain viewer.
    pub fn viewer(identity: impl AsRef<str>) -> Self {
        Self {
            identity: ViewerKey::new(identity),
            display_name: None,
            display_role: String::from("viewer"),
            subscription_flag: false,
        }
    }

    /// Every role this entry holds.
    ///
    /// The display role is always included, and the subscription flag adds
    /// [`Role::Subscriber`].
    pub fn roles(&self) -> BTreeSet<Role> {
        let mut roles = BTreeSet::new();
        roles.insert(Role::Viewer);
        roles.insert(Role::from_label(&self.display_role));
        if self.subscription_flag {
            roles.insert(Role::Subscriber);
        }
        roles
    }

    /// Name to draw under the creature.
    pub fn label(&self) -> String {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map_or_else(|| self.identity.to_string(), str::to_owned)
    }
}

// ---------------------------------------------------------------------------
// Broadcaster configuration
// ---------------------------------------------------------------------------

/// Feature switches the broadcaster can flip from the settings editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct FeatureToggles {
    /// Departing viewers may be eaten, and predation triggers are honored.
    #[serde(default = "default_true")]
    pub predation: bool,
    /// Race triggers are honored.
    #[serde(default = "default_true")]
    pub races: bool,
    /// Pairing triggers are honored.
    #[serde(default = "default_true")]
    pub pairing: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            predation: true,
            races: true,
            pairing: true,
        }
    }
}

/// The broadcaster's overlay settings.
///
/// Owned by the external configuration service; the engine keeps a
/// read-only, version-guarded cache of it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct OverlayConfig {
    /// Monotonically increasing version, bumped on every save.
    pub version: u64,
    /// Roles allowed to wear each skin. A skin that is absent, or mapped to
    /// an empty list, is unrestricted.
    #[serde(default)]
    pub skin_role_permissions: BTreeMap<SkinId, Vec<Role>>,
    /// Identities that never get a creature.
    #[serde(default)]
    pub excluded_identities: BTreeSet<ViewerKey>,
    /// Feature switches.
    #[serde(default)]
    pub feature_toggles: FeatureToggles,
    /// Seed for the procedural decoration layout.
    #[serde(default)]
    pub scene_seed: u64,
    /// Decorations placed in the scene.
    #[serde(default)]
    pub active_decoration_ids: Vec<DecorationId>,
}

impl OverlayConfig {
    /// Whether the identity is on the broadcaster's exclusion list.
    pub fn excludes(&self, identity: &ViewerKey) -> bool {
        self.excluded_identities.contains(identity)
            || self
                .excluded_identities
                .iter()
                .any(|excluded| excluded.normalized() == *identity)
    }
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

/// An inbound request from the automation controller to start an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TriggerMessage {
    /// Channel the trigger is addressed to; other channels are ignored.
    pub streamer: ViewerKey,
    /// What to start.
    pub event_kind: TriggerKind,
    /// Participant identities, in order.
    #[serde(default)]
    pub participants: Vec<ViewerKey>,
    /// Speech text (only for [`TriggerKind::Speak`]).
    #[serde(default)]
    pub text: Option<String>,
}

impl TriggerMessage {
    /// Whether the trigger is addressed to the given channel.
    pub fn is_for(&self, streamer: &ViewerKey) -> bool {
        self.streamer.normalized() == streamer.normalized()
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Report sent to the automation controller when a race concludes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct RaceWinnerReport {
    /// Channel the race ran in.
    pub streamer: ViewerKey,
    /// The race event.
    pub event_id: EventId,
    /// First participant across the line.
    pub winner: ViewerKey,
    /// The other participant, if it was still present.
    pub runner_up: Option<ViewerKey>,
    /// Wall-clock time the winner crossed the line.
    pub finished_at: DateTime<Utc>,
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn roster_entry_parses_controller_json() {
        let json = r#"{"identity":"Nemo","displayRole":"moderator","subscriptionFlag":true}"#;
        let entry: RosterEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.identity.normalized().as_str(), "nemo");
        let roles = entry.roles();
        assert!(roles.contains(&Role::Moderator));
        assert!(roles.contains(&Role::Subscriber));
        assert!(roles.contains(&Role::Viewer));
    }

    #[test]
    fn label_falls_back_to_identity() {
        let mut entry = RosterEntry::viewer("dory");
        assert_eq!(entry.label(), "dory");
        entry.display_name = Some(String::from("  "));
        assert_eq!(entry.label(), "dory");
        entry.display_name = Some(String::from("Dory"));
        assert_eq!(entry.label(), "Dory");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let json = r#"{"version":7,"sceneSeed":42}"#;
        let config: OverlayConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.version, 7);
        assert_eq!(config.scene_seed, 42);
        assert!(config.feature_toggles.predation);
        assert!(config.feature_toggles.races);
        assert!(config.skin_role_permissions.is_empty());
    }

    #[test]
    fn exclusion_is_case_insensitive() {
        let json = r#"{"version":1,"excludedIdentities":["StreamElements"]}"#;
        let config: OverlayConfig = serde_json::from_str(json).unwrap();
        assert!(config.excludes(&ViewerKey::new("streamelements")));
        assert!(!config.excludes(&ViewerKey::new("nemo")));
    }

    #[test]
    fn trigger_addressing() {
        let json = r#"{"streamer":"Reef","eventKind":"race","participants":["a","b"]}"#;
        let trigger: TriggerMessage = serde_json::from_str(json).unwrap();
        assert_eq!(trigger.event_kind, TriggerKind::Race);
        assert_eq!(trigger.participants.len(), 2);
        assert!(trigger.is_for(&ViewerKey::new("reef")));
        assert!(!trigger.is_for(&ViewerKey::new("lagoon")));
    }

    #[test]
    fn config_without_version_is_rejected() {
        let json = r#"{"sceneSeed":42}"#;
        assert!(serde_json::from_str::<OverlayConfig>(json).is_err());
    }
}
