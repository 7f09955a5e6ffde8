//! Entity registry: the authoritative set of live creatures.
//!
//! [`Registry::reconcile`] turns a roster snapshot into create, refresh,
//! and depart operations. It performs no I/O; skins come from the context's
//! session cache, which the roster poller fills before each cycle.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use shoal_types::{Facing, RosterEntry, ViewerKey};
use tracing::debug;

use crate::config::AppConfig;
use crate::context::OverlayContext;
use crate::entity::{EventClaim, Lifecycle, Speech};
use crate::scene;

pub use crate::entity::Entity;

/// What one reconcile cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Identities that got a new entity.
    pub created: Vec<ViewerKey>,
    /// Identities already present whose entity was refreshed.
    pub refreshed: usize,
    /// Identities that dropped from the roster this cycle.
    pub departed: Vec<ViewerKey>,
    /// Roster rows skipped (excluded, hidden, suppressed, blank, duplicate).
    pub filtered: usize,
}

/// What one lifecycle pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleReport {
    /// Entities that finished arriving.
    pub activated: usize,
    /// Entities whose fade or death animation finished.
    pub removed: usize,
    /// Speech bubbles that expired.
    pub speech_expired: usize,
}

/// All entities, keyed by identity, plus the post-predation grace list.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entities: BTreeMap<ViewerKey, Entity>,
    suppressed: BTreeMap<ViewerKey, u64>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconcile a roster snapshot.
    ///
    /// Filters excluded, hidden, and suppressed identities; creates new
    /// ones with a timed arrival; refreshes known ones (skin, stale
    /// departure); marks missing ones as departing. Handing departures to
    /// predation is the caller's decision.
    pub fn reconcile<R: Rng + ?Sized>(
        &mut self,
        roster: &[RosterEntry],
        ctx: &OverlayContext,
        settings: &AppConfig,
        now_ms: u64,
        rng: &mut R,
    ) -> ReconcileOutcome {
        self.purge_removed();
        self.suppressed.retain(|_, until| *until > now_ms);

        let mut outcome = ReconcileOutcome::default();
        let mut present: BTreeSet<ViewerKey> = BTreeSet::new();

        for entry in roster {
            let key = entry.identity.normalized();
            if key.is_blank()
                || ctx.is_filtered(&key)
                || self.suppressed.contains_key(&key)
                || !present.insert(key.clone())
            {
                outcome.filtered = outcome.filtered.saturating_add(1);
                continue;
            }

            let skin = ctx.skins.resolve(entry, ctx.config.config());
            if let Some(entity) = self.entities.get_mut(&key) {
                entity.skin = skin;
                entity.display_name = entry.label();
                if matches!(entity.lifecycle, Lifecycle::Departing { .. })
                    && !matches!(entity.claim, EventClaim::Predation(_))
                {
                    entity.lifecycle = Lifecycle::Active;
                }
                outcome.refreshed = outcome.refreshed.saturating_add(1);
            } else {
                let position = scene::random_point_in_band(&settings.scene, rng);
                let target = scene::random_point_in_band(&settings.scene, rng);
                let entity = Entity {
                    key: key.clone(),
                    display_name: entry.label(),
                    skin,
                    position,
                    target,
                    speed: scene::random_speed(&settings.scene, rng),
                    facing: scene::facing_toward(position.x, target.x, Facing::Right),
                    lifecycle: Lifecycle::Arriving {
                        until_ms: now_ms.saturating_add(settings.timing.arrival_ms),
                    },
                    claim: EventClaim::None,
                    frozen: false,
                    speech: None,
                    race: None,
                };
                debug!(identity = %key, skin = %entity.skin, "entity created");
                self.entities.insert(key.clone(), entity);
                outcome.created.push(key);
            }
        }

        let fade_until = now_ms.saturating_add(settings.timing.departure_fade_ms);
        for (key, entity) in &mut self.entities {
            if present.contains(key) {
                continue;
            }
            if matches!(entity.lifecycle, Lifecycle::Arriving { .. } | Lifecycle::Active) {
                entity.lifecycle = Lifecycle::Departing {
                    until_ms: fade_until,
                };
                debug!(identity = %key, "entity departing");
                outcome.departed.push(key.clone());
            }
        }

        outcome
    }

    /// Advance timed lifecycle stages and expire speech.
    ///
    /// Claimed entities are never removed here; their event releases them.
    pub fn advance_lifecycles(&mut self, now_ms: u64) -> LifecycleReport {
        let mut report = LifecycleReport::default();
        for entity in self.entities.values_mut() {
            if entity.speech.as_ref().is_some_and(|s| s.expires_at_ms <= now_ms) {
                entity.speech = None;
                report.speech_expired = report.speech_expired.saturating_add(1);
            }
            match entity.lifecycle {
                Lifecycle::Arriving { until_ms } if until_ms <= now_ms => {
                    entity.lifecycle = Lifecycle::Active;
                    report.activated = report.activated.saturating_add(1);
                }
                Lifecycle::Departing { until_ms } | Lifecycle::Dead { until_ms }
                    if until_ms <= now_ms && entity.claim.is_none() =>
                {
                    entity.lifecycle = Lifecycle::Removed;
                    report.removed = report.removed.saturating_add(1);
                }
                _ => {}
            }
        }
        report
    }

    /// Drop entities marked removed. Returns how many were purged.
    pub fn purge_removed(&mut self) -> usize {
        let before = self.entities.len();
        self.entities
            .retain(|_, entity| !matches!(entity.lifecycle, Lifecycle::Removed));
        before.saturating_sub(self.entities.len())
    }

    /// Send every entity into its exit fade (used on controller loss).
    ///
    /// Entities already dead keep their animation.
    pub fn depart_all(&mut self, now_ms: u64, fade_ms: u64) -> usize {
        let until_ms = now_ms.saturating_add(fade_ms);
        let mut count: usize = 0;
        for entity in self.entities.values_mut() {
            if matches!(entity.lifecycle, Lifecycle::Arriving { .. } | Lifecycle::Active) {
                entity.lifecycle = Lifecycle::Departing { until_ms };
                count = count.saturating_add(1);
            }
        }
        count
    }

    /// Keep an identity out of the scene until `until_ms`.
    pub fn suppress(&mut self, key: ViewerKey, until_ms: u64) {
        self.suppressed.insert(key, until_ms);
    }

    /// Whether an identity is inside its grace window.
    pub fn is_suppressed(&self, key: &ViewerKey, now_ms: u64) -> bool {
        self.suppressed.get(key).is_some_and(|until| *until > now_ms)
    }

    /// Show a speech bubble on a live entity. Returns `false` if there is
    /// no such entity.
    pub fn set_speech(&mut self, key: &ViewerKey, text: &str, expires_at_ms: u64, max_chars: usize) -> bool {
        let Some(entity) = self.entities.get_mut(key).filter(|e| e.is_live()) else {
            return false;
        };
        let text: String = text.trim().chars().take(max_chars).collect();
        if text.is_empty() {
            entity.speech = None;
        } else {
            entity.speech = Some(Speech {
                text,
                expires_at_ms,
            });
        }
        true
    }

    /// Look up an entity.
    pub fn get(&self, key: &ViewerKey) -> Option<&Entity> {
        self.entities.get(key)
    }

    /// Look up an entity for mutation.
    pub fn get_mut(&mut self, key: &ViewerKey) -> Option<&mut Entity> {
        self.entities.get_mut(key)
    }

    /// Iterate entities in identity order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Iterate entities mutably in identity order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.values_mut()
    }

    /// Number of entities (including ones awaiting purge).
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn insert(&mut self, entity: Entity) {
        self.entities.insert(entity.key.clone(), entity);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use shoal_types::{EventId, OverlayConfig};

    use super::*;
    use crate::context::ConfigChannel;

    fn setup() -> (Registry, OverlayContext, AppConfig, SmallRng) {
        let settings = AppConfig::default();
        let ctx = OverlayContext::new(&settings.streamer);
        (Registry::new(), ctx, settings, SmallRng::seed_from_u64(1))
    }

    fn roster(names: &[&str]) -> Vec<RosterEntry> {
        names.iter().map(RosterEntry::viewer).collect()
    }

    #[test]
    fn one_entity_per_identity() {
        let (mut registry, ctx, settings, mut rng) = setup();
        let outcome = registry.reconcile(&roster(&["a", "B", "b", " a "]), &ctx, &settings, 0, &mut rng);
        assert_eq!(outcome.created.len(), 2);
        assert_eq!(outcome.filtered, 2);
        assert_eq!(registry.len(), 2);

        let again = registry.reconcile(&roster(&["a", "b"]), &ctx, &settings, 100, &mut rng);
        assert!(again.created.is_empty());
        assert_eq!(again.refreshed, 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn new_entities_arrive_then_activate() {
        let (mut registry, ctx, settings, mut rng) = setup();
        registry.reconcile(&roster(&["a"]), &ctx, &settings, 0, &mut rng);
        let key = ViewerKey::new("a");
        assert!(matches!(registry.get(&key).unwrap().lifecycle, Lifecycle::Arriving { .. }));
        registry.advance_lifecycles(settings.timing.arrival_ms);
        assert_eq!(registry.get(&key).unwrap().lifecycle, Lifecycle::Active);
    }

    #[test]
    fn excluded_and_hidden_identities_filtered() {
        let (mut registry, mut ctx, settings, mut rng) = setup();
        let mut config = OverlayConfig {
            version: 1,
            ..OverlayConfig::default()
        };
        config.excluded_identities.insert(ViewerKey::new("bot"));
        ctx.config.apply(config, ConfigChannel::Poll);

        let outcome = registry.reconcile(
            &roster(&["bot", "streamer", "nemo"]),
            &ctx,
            &settings,
            0,
            &mut rng,
        );
        assert_eq!(outcome.created, vec![ViewerKey::new("nemo")]);
        assert_eq!(outcome.filtered, 2);
    }

    #[test]
    fn missing_identity_departs_then_is_removed() {
        let (mut registry, ctx, settings, mut rng) = setup();
        registry.reconcile(&roster(&["a", "b"]), &ctx, &settings, 0, &mut rng);
        let outcome = registry.reconcile(&roster(&["b"]), &ctx, &settings, 100, &mut rng);
        assert_eq!(outcome.departed, vec![ViewerKey::new("a")]);

        let fade_end = 100 + settings.timing.departure_fade_ms;
        registry.advance_lifecycles(fade_end);
        assert_eq!(
            registry.get(&ViewerKey::new("a")).unwrap().lifecycle,
            Lifecycle::Removed
        );
        assert_eq!(registry.purge_removed(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn returning_identity_clears_departure() {
        let (mut registry, ctx, settings, mut rng) = setup();
        registry.reconcile(&roster(&["a"]), &ctx, &settings, 0, &mut rng);
        registry.advance_lifecycles(settings.timing.arrival_ms);
        registry.reconcile(&roster(&[]), &ctx, &settings, 2_000, &mut rng);
        registry.reconcile(&roster(&["a"]), &ctx, &settings, 2_100, &mut rng);
        assert_eq!(
            registry.get(&ViewerKey::new("a")).unwrap().lifecycle,
            Lifecycle::Active
        );
    }

    #[test]
    fn predation_claimed_departure_is_not_cleared() {
        let (mut registry, ctx, settings, mut rng) = setup();
        registry.reconcile(&roster(&["a"]), &ctx, &settings, 0, &mut rng);
        registry.reconcile(&roster(&[]), &ctx, &settings, 100, &mut rng);
        let key = ViewerKey::new("a");
        registry.get_mut(&key).unwrap().claim = EventClaim::Predation(EventId::new());
        registry.reconcile(&roster(&["a"]), &ctx, &settings, 200, &mut rng);
        assert!(matches!(
            registry.get(&key).unwrap().lifecycle,
            Lifecycle::Departing { .. }
        ));
        registry.advance_lifecycles(60_000);
        assert!(matches!(
            registry.get(&key).unwrap().lifecycle,
            Lifecycle::Departing { .. }
        ));
    }

    #[test]
    fn suppressed_identity_not_respawned_until_grace_ends() {
        let (mut registry, ctx, settings, mut rng) = setup();
        registry.suppress(ViewerKey::new("a"), 5_000);
        let early = registry.reconcile(&roster(&["a"]), &ctx, &settings, 1_000, &mut rng);
        assert!(early.created.is_empty());
        let late = registry.reconcile(&roster(&["a"]), &ctx, &settings, 5_000, &mut rng);
        assert_eq!(late.created.len(), 1);
    }

    #[test]
    fn speech_is_truncated_and_expires() {
        let (mut registry, ctx, settings, mut rng) = setup();
        registry.reconcile(&roster(&["a"]), &ctx, &settings, 0, &mut rng);
        let key = ViewerKey::new("a");
        assert!(registry.set_speech(&key, "  hello there  ", 500, 5));
        assert_eq!(registry.get(&key).unwrap().speech.as_ref().unwrap().text, "hello");
        assert!(!registry.set_speech(&ViewerKey::new("ghost"), "hi", 500, 5));
        let report = registry.advance_lifecycles(500);
        assert_eq!(report.speech_expired, 1);
        assert!(registry.get(&key).unwrap().speech.is_none());
    }

    #[test]
    fn depart_all_fades_everyone() {
        let (mut registry, ctx, settings, mut rng) = setup();
        registry.reconcile(&roster(&["a", "b", "c"]), &ctx, &settings, 0, &mut rng);
        assert_eq!(registry.depart_all(10, 100), 3);
        registry.advance_lifecycles(110);
        assert_eq!(registry.purge_removed(), 3);
        assert!(registry.is_empty());
    }
}
