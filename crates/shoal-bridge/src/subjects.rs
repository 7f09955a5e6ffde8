//! Controller subject naming and payload decoding.
//!
//! # Subject Convention
//!
//! Every subject is scoped to one streamer channel:
//!
//! - **Roster request:** `shoal.{streamer}.roster.request` (request/reply)
//! - **Triggers:** `shoal.{streamer}.trigger`
//! - **Race winner:** `shoal.{streamer}.race.winner`
//! - **Config saved:** `shoal.{streamer}.config.saved`

use serde::{Deserialize, Serialize};
use shoal_types::{OverlayConfig, RosterEntry, TriggerMessage, ViewerKey};

use crate::error::BridgeError;

/// All subjects for one streamer channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subjects {
    /// Roster request/reply.
    pub roster_request: String,
    /// Inbound triggers.
    pub triggers: String,
    /// Outbound race winners.
    pub race_winner: String,
    /// Config pushes after a broadcaster save.
    pub config_saved: String,
}

impl Subjects {
    /// Subjects for the given streamer.
    ///
    /// Subject tokens cannot contain `.`, `*`, `>` or whitespace, so those
    /// are replaced with `_`.
    pub fn for_streamer(streamer: &ViewerKey) -> Self {
        let token: String = streamer
            .normalized()
            .as_str()
            .chars()
            .map(|c| {
                if c == '.' || c == '*' || c == '>' || c.is_whitespace() {
                    '_'
                } else {
                    c
                }
            })
            .collect();
        Self {
            roster_request: format!("shoal.{token}.roster.request"),
            triggers: format!("shoal.{token}.trigger"),
            race_winner: format!("shoal.{token}.race.winner"),
            config_saved: format!("shoal.{token}.config.saved"),
        }
    }
}

/// Body of a roster request.
#[derive(Debug, Serialize)]
pub struct RosterRequest<'a> {
    /// Channel whose audience is wanted.
    pub streamer: &'a ViewerKey,
}

/// The controller answers with either a bare list or a wrapped one.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RosterReply {
    Bare(Vec<RosterEntry>),
    Wrapped { roster: Vec<RosterEntry> },
}

/// Decode a roster reply.
pub fn decode_roster(payload: &[u8]) -> Result<Vec<RosterEntry>, BridgeError> {
    let reply: RosterReply =
        serde_json::from_slice(payload).map_err(|source| BridgeError::Decode {
            what: "roster",
            source,
        })?;
    Ok(match reply {
        RosterReply::Bare(entries) | RosterReply::Wrapped { roster: entries } => entries,
    })
}

/// Decode an inbound trigger.
pub fn decode_trigger(payload: &[u8]) -> Result<TriggerMessage, BridgeError> {
    serde_json::from_slice(payload).map_err(|source| BridgeError::Decode {
        what: "trigger",
        source,
    })
}

/// Decode a config payload (push or poll).
pub fn decode_config(payload: &[u8]) -> Result<OverlayConfig, BridgeError> {
    serde_json::from_slice(payload).map_err(|source| BridgeError::Decode {
        what: "overlay config",
        source,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use shoal_types::TriggerKind;

    use super::*;

    #[test]
    fn subjects_are_scoped_to_the_streamer() {
        let subjects = Subjects::for_streamer(&ViewerKey::new("Reef"));
        assert_eq!(subjects.roster_request, "shoal.reef.roster.request");
        assert_eq!(subjects.triggers, "shoal.reef.trigger");
        assert_eq!(subjects.race_winner, "shoal.reef.race.winner");
        assert_eq!(subjects.config_saved, "shoal.reef.config.saved");
    }

    #[test]
    fn wildcards_cannot_leak_into_subjects() {
        let subjects = Subjects::for_streamer(&ViewerKey::new("a.b*c>"));
        assert_eq!(subjects.triggers, "shoal.a_b_c_.trigger");
    }

    #[test]
    fn roster_accepts_bare_and_wrapped_lists() {
        let bare = br#"[{"identity":"nemo","displayRole":"viewer"}]"#;
        let wrapped = br#"{"roster":[{"identity":"nemo"},{"identity":"dory"}]}"#;
        assert_eq!(decode_roster(bare).unwrap().len(), 1);
        assert_eq!(decode_roster(wrapped).unwrap().len(), 2);
    }

    #[test]
    fn malformed_roster_is_a_decode_error() {
        let err = decode_roster(b"{\"roster\": 7}").unwrap_err();
        assert!(matches!(err, BridgeError::Decode { what: "roster", .. }));
    }

    #[test]
    fn trigger_decodes() {
        let trigger =
            decode_trigger(br#"{"streamer":"reef","eventKind":"predation","participants":["nemo"]}"#)
                .unwrap();
        assert_eq!(trigger.event_kind, TriggerKind::Predation);
    }

    #[test]
    fn config_decodes_with_defaults() {
        let config = decode_config(br#"{"version":9}"#).unwrap();
        assert_eq!(config.version, 9);
        assert!(config.active_decoration_ids.is_empty());
    }
}
