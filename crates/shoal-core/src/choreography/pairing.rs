//! Pairing: two creatures meet in the middle and show affection.

use rand::Rng;
use shoal_types::{EffectKind, EventId, EventKind, EventView, Facing, Point, ViewerKey};
use tracing::{debug, warn};

use super::wait::{ArrivalWait, WaitPoll};
use super::{EventReport, Stage};
use crate::config::AppConfig;
use crate::entity::{Entity, EventClaim};
use crate::registry::Registry;
use crate::scene;

/// Pairing phases, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PairingPhase {
    /// Both swimming to their spot beside the midpoint.
    Approach,
    /// Hard-set onto the spots and frozen.
    Snap,
    /// Shared effect on display.
    Display,
    /// Returned to free roam.
    Release,
}

impl PairingPhase {
    /// Phase name used in frames and logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Approach => "approach",
            Self::Snap => "snap",
            Self::Display => "display",
            Self::Release => "release",
        }
    }
}

/// One pairing event.
#[derive(Debug, Clone)]
pub struct Pairing {
    id: EventId,
    left: ViewerKey,
    right: ViewerKey,
    left_spot: Point,
    right_spot: Point,
    midpoint: Point,
    phase: PairingPhase,
    phase_started_ms: u64,
    started_ms: u64,
    wait: ArrivalWait,
}

impl Pairing {
    /// Lay out the meeting point between two entities.
    ///
    /// The midpoint is clamped so both spots stay inside the wander band;
    /// whichever participant is further left takes the left spot.
    pub(crate) fn new(id: EventId, a: &Entity, b: &Entity, settings: &AppConfig, now_ms: u64) -> Self {
        let scene_config = &settings.scene;
        let half_gap = settings.events.pairing.gap / 2.0;
        let pa = scene::sanitize(a.position, scene_config);
        let pb = scene::sanitize(b.position, scene_config);

        let (min_y, max_y) = scene_config.band();
        let min_x = half_gap.min(scene_config.width / 2.0);
        let max_x = (scene_config.width - half_gap).max(min_x);
        let midpoint = Point::new(
            f64::midpoint(pa.x, pb.x).clamp(min_x, max_x),
            f64::midpoint(pa.y, pb.y).clamp(min_y, max_y),
        );

        let (left, right) = if pa.x <= pb.x {
            (a.key.clone(), b.key.clone())
        } else {
            (b.key.clone(), a.key.clone())
        };

        Self {
            id,
            left,
            right,
            left_spot: Point::new(midpoint.x - half_gap, midpoint.y),
            right_spot: Point::new(midpoint.x + half_gap, midpoint.y),
            midpoint,
            phase: PairingPhase::Approach,
            phase_started_ms: now_ms,
            started_ms: now_ms,
            wait: ArrivalWait::new(now_ms, &settings.events.sync),
        }
    }

    /// Claim both participants and point them at their spots.
    pub(crate) fn engage(&self, registry: &mut Registry) {
        for (key, spot) in [(&self.left, self.left_spot), (&self.right, self.right_spot)] {
            if let Some(entity) = registry.get_mut(key) {
                entity.claim = EventClaim::Pairing(self.id);
                entity.target = spot;
            }
        }
    }

    /// Current phase.
    pub const fn phase(&self) -> PairingPhase {
        self.phase
    }

    /// Participants, left then right.
    pub fn participants(&self) -> Vec<ViewerKey> {
        vec![self.left.clone(), self.right.clone()]
    }

    pub(crate) fn step<R: Rng + ?Sized>(&mut self, stage: &mut Stage<'_, R>) -> Option<EventReport> {
        if self.phase < PairingPhase::Release
            && !(stage.is_present(&self.left) && stage.is_present(&self.right))
        {
            debug!(event_id = %self.id, "pairing participant left, releasing");
            self.wait.cancel();
            return Some(self.release(stage));
        }

        match self.phase {
            PairingPhase::Approach => self.approach(stage),
            PairingPhase::Snap => self.snap(stage),
            PairingPhase::Display => {
                let display_ms = stage.settings.events.pairing.display_ms;
                if stage.now_ms.saturating_sub(self.phase_started_ms) >= display_ms {
                    self.enter(PairingPhase::Release, stage.now_ms);
                }
            }
            PairingPhase::Release => return Some(self.release(stage)),
        }
        None
    }

    fn enter(&mut self, phase: PairingPhase, now_ms: u64) {
        debug!(event_id = %self.id, phase = phase.name(), "pairing phase");
        self.phase = phase;
        self.phase_started_ms = now_ms;
    }

    fn approach<R: Rng + ?Sized>(&mut self, stage: &mut Stage<'_, R>) {
        let factor = stage.settings.events.pairing.approach_speed_factor;
        stage.drive_toward(&self.left, self.left_spot, factor);
        stage.drive_toward(&self.right, self.right_spot, factor);

        let tolerance = stage.settings.events.sync.tolerance;
        let arrived = || {
            stage.is_near(&self.left, self.left_spot, tolerance)
                && stage.is_near(&self.right, self.right_spot, tolerance)
        };
        if let WaitPoll::Done(outcome) = self.wait.poll(stage.now_ms, arrived) {
            if outcome != shoal_types::SyncOutcome::Arrived {
                warn!(event_id = %self.id, ?outcome, "pairing proceeding without arrival");
            }
            self.enter(PairingPhase::Snap, stage.now_ms);
        }
    }

    /// Remove residual drift, freeze, face each other, show the effect.
    fn snap<R: Rng + ?Sized>(&mut self, stage: &mut Stage<'_, R>) {
        for (key, spot, facing) in [
            (&self.left, self.left_spot, Facing::Right),
            (&self.right, self.right_spot, Facing::Left),
        ] {
            if let Some(entity) = stage.registry.get_mut(key) {
                entity.position = spot;
                entity.target = spot;
                entity.facing = facing;
                entity.frozen = true;
            }
        }
        let display_ms = stage.settings.events.pairing.display_ms;
        stage.raise(EffectKind::Hearts, self.midpoint, display_ms);
        self.enter(PairingPhase::Display, stage.now_ms);
    }

    fn release<R: Rng + ?Sized>(&mut self, stage: &mut Stage<'_, R>) -> EventReport {
        stage.release(&self.left, self.id);
        stage.release(&self.right, self.id);
        self.phase = PairingPhase::Release;
        EventReport {
            id: self.id,
            kind: EventKind::Pairing,
            participants: self.participants(),
            sync: self.wait.outcome(),
            winner: None,
            started_ms: self.started_ms,
            finished_ms: stage.now_ms,
        }
    }

    /// Render projection.
    pub fn view(&self) -> EventView {
        EventView {
            id: self.id,
            kind: EventKind::Pairing,
            phase: self.phase.name().to_owned(),
            participants: self.participants(),
            attacker: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use shoal_types::{FeatureToggles, SyncOutcome};

    use super::*;
    use crate::choreography::Choreographer;
    use crate::choreography::tests::{keys, registry_with, run_to_completion};
    use crate::entity::Lifecycle;

    #[test]
    fn pairing_meets_at_offset_midpoint_and_releases() {
        let settings = AppConfig::default();
        let mut registry = registry_with(&["a", "b"]);
        let mut choreo = Choreographer::new();
        let mut rng = SmallRng::seed_from_u64(21);
        assert!(choreo
            .begin_pairing(&mut registry, &keys(&["a", "b"]), FeatureToggles::default(), &settings, 0)
            .is_started());

        let mut now = 0;
        let mut snapped = false;
        while !choreo.is_empty() {
            now += settings.timing.tick_interval_ms;
            choreo.advance(&mut registry, &settings, now, &mut rng);
            let a = registry.get(&ViewerKey::new("a")).unwrap();
            let b = registry.get(&ViewerKey::new("b")).unwrap();
            if a.frozen && b.frozen {
                snapped = true;
                assert!((b.position.x - a.position.x - settings.events.pairing.gap).abs() < 1e-9);
                assert_eq!(a.facing, Facing::Right);
                assert_eq!(b.facing, Facing::Left);
            }
        }
        assert!(snapped);
        for entity in registry.iter() {
            assert!(entity.claim.is_none());
            assert!(!entity.frozen);
        }
    }

    #[test]
    fn pairing_finishes_within_timeout_when_a_participant_is_stuck() {
        let settings = AppConfig::default();
        let mut registry = registry_with(&["a", "b"]);
        let mut choreo = Choreographer::new();
        let mut rng = SmallRng::seed_from_u64(21);
        choreo.begin_pairing(&mut registry, &keys(&["a", "b"]), FeatureToggles::default(), &settings, 0);
        registry.get_mut(&ViewerKey::new("a")).unwrap().speed = 0.000_001;

        let (reports, _, end) = run_to_completion(&mut choreo, &mut registry, &settings, 0, &mut rng);
        let report = reports.first().unwrap();
        assert_eq!(report.sync, Some(SyncOutcome::TimedOut));
        let bound = settings.events.sync.timeout_ms
            + settings.events.pairing.display_ms
            + 10 * settings.timing.tick_interval_ms;
        assert!(end <= bound);
        assert!(registry.iter().all(|e| e.claim.is_none() && !e.frozen));
    }

    #[test]
    fn vanished_participant_releases_partner() {
        let settings = AppConfig::default();
        let mut registry = registry_with(&["a", "b"]);
        let mut choreo = Choreographer::new();
        let mut rng = SmallRng::seed_from_u64(21);
        choreo.begin_pairing(&mut registry, &keys(&["a", "b"]), FeatureToggles::default(), &settings, 0);
        registry.get_mut(&ViewerKey::new("a")).unwrap().lifecycle = Lifecycle::Removed;

        let (reports, _, _) = run_to_completion(&mut choreo, &mut registry, &settings, 0, &mut rng);
        assert_eq!(reports.first().unwrap().sync, Some(SyncOutcome::Cancelled));
        let b = registry.get(&ViewerKey::new("b")).unwrap();
        assert!(b.claim.is_none());
    }

    #[test]
    fn pair_at_the_wall_snaps_inside_scene() {
        let settings = AppConfig::default();
        let mut registry = registry_with(&["a", "b"]);
        registry.get_mut(&ViewerKey::new("a")).unwrap().position = Point::new(0.0, 70.0);
        registry.get_mut(&ViewerKey::new("b")).unwrap().position = Point::new(1.0, 70.0);
        let mut choreo = Choreographer::new();
        let mut rng = SmallRng::seed_from_u64(5);
        let started = choreo.begin_pairing(
            &mut registry,
            &keys(&["a", "b"]),
            FeatureToggles::default(),
            &settings,
            0,
        );
        assert!(started.is_started());

        let mut now = 0;
        while !registry.get(&ViewerKey::new("a")).unwrap().frozen && now < 60_000 {
            now += settings.timing.tick_interval_ms;
            choreo.advance(&mut registry, &settings, now, &mut rng);
        }

        let a = registry.get(&ViewerKey::new("a")).unwrap().position;
        let b = registry.get(&ViewerKey::new("b")).unwrap().position;
        assert!(a.x >= 0.0 && b.x <= settings.scene.width);
        assert!((b.x - a.x - settings.events.pairing.gap).abs() < 1e-9);
        let hearts = choreo.effect_views(now);
        let effect = hearts.first().unwrap();
        assert_eq!(effect.kind, EffectKind::Hearts);
        assert!((effect.position.x - f64::midpoint(a.x, b.x)).abs() < 1e-9);
    }
}
