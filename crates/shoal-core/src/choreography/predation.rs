//! Predation: a predator sweeps in from off-scene and eats one creature.

use rand::Rng;
use shoal_types::{AttackerView, EffectKind, EventId, EventKind, EventView, Facing, Point, ViewerKey};
use tracing::debug;

use super::{EventReport, Stage};
use crate::clock::progress;
use crate::entity::Lifecycle;
use crate::scene;

/// Why a predation was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredationOrigin {
    /// The target dropped from the roster.
    Departure,
    /// The automation controller asked for it.
    Trigger,
}

/// Predation phases, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PredationPhase {
    /// Choosing the entry side.
    Spawn,
    /// Attacker swimming to the strike point.
    Approach,
    /// Target struck; short pause.
    Strike,
    /// Attacker leaving off the opposite side.
    Withdraw,
    /// Cleanup.
    Complete,
}

impl PredationPhase {
    /// Phase name used in frames and logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Spawn => "spawn",
            Self::Approach => "approach",
            Self::Strike => "strike",
            Self::Withdraw => "withdraw",
            Self::Complete => "complete",
        }
    }
}

/// Attacker path, fixed at spawn.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Path {
    entry: Point,
    strike: Point,
    exit: Point,
    facing: Facing,
}

/// One predation event. The attacker exists only inside the event.
#[derive(Debug, Clone)]
pub struct Predation {
    id: EventId,
    target: ViewerKey,
    phase: PredationPhase,
    phase_started_ms: u64,
    started_ms: u64,
    path: Option<Path>,
    attacker: Option<Point>,
}

impl Predation {
    pub(crate) const fn new(id: EventId, target: ViewerKey, now_ms: u64) -> Self {
        Self {
            id,
            target,
            phase: PredationPhase::Spawn,
            phase_started_ms: now_ms,
            started_ms: now_ms,
            path: None,
            attacker: None,
        }
    }

    /// Current phase.
    pub const fn phase(&self) -> PredationPhase {
        self.phase
    }

    /// The creature being hunted.
    pub const fn target(&self) -> &ViewerKey {
        &self.target
    }

    /// Current attacker position, once spawned.
    pub const fn attacker(&self) -> Option<Point> {
        self.attacker
    }

    pub(crate) fn step<R: Rng + ?Sized>(&mut self, stage: &mut Stage<'_, R>) -> Option<EventReport> {
        match self.phase {
            PredationPhase::Spawn => self.spawn(stage),
            PredationPhase::Approach => self.approach(stage),
            PredationPhase::Strike => self.hold(stage),
            PredationPhase::Withdraw => self.withdraw(stage),
            PredationPhase::Complete => return Some(self.complete(stage)),
        }
        None
    }

    fn enter(&mut self, phase: PredationPhase, now_ms: u64) {
        debug!(event_id = %self.id, phase = phase.name(), "predation phase");
        self.phase = phase;
        self.phase_started_ms = now_ms;
    }

    /// Pick a random side and lay out the attacker's path at the target's
    /// vertical coordinate.
    fn spawn<R: Rng + ?Sized>(&mut self, stage: &mut Stage<'_, R>) {
        let scene_config = &stage.settings.scene;
        let tuning = &stage.settings.events.predation;
        let Some(position) = stage
            .registry
            .get(&self.target)
            .map(|e| scene::sanitize(e.position, scene_config))
        else {
            self.enter(PredationPhase::Complete, stage.now_ms);
            return;
        };

        let from_left = stage.rng.random_bool(0.5);
        let (entry_x, exit_x, strike_x, facing) = if from_left {
            (
                -tuning.offscreen_margin,
                scene_config.width + tuning.offscreen_margin,
                position.x - tuning.strike_gap,
                Facing::Right,
            )
        } else {
            (
                scene_config.width + tuning.offscreen_margin,
                -tuning.offscreen_margin,
                position.x + tuning.strike_gap,
                Facing::Left,
            )
        };
        let path = Path {
            entry: Point::new(entry_x, position.y),
            strike: Point::new(strike_x, position.y),
            exit: Point::new(exit_x, position.y),
            facing,
        };
        self.attacker = Some(path.entry);
        self.path = Some(path);
        self.enter(PredationPhase::Approach, stage.now_ms);
    }

    fn approach<R: Rng + ?Sized>(&mut self, stage: &mut Stage<'_, R>) {
        let Some(path) = self.path else {
            self.enter(PredationPhase::Complete, stage.now_ms);
            return;
        };
        let duration = stage.settings.events.predation.approach_ms;
        let t = progress(self.phase_started_ms, stage.now_ms, duration);
        self.attacker = Some(scene::lerp(path.entry, path.strike, t));
        if t >= 1.0 {
            self.strike(stage);
        }
    }

    /// Mark the target dead and raise the bite effect at its last position.
    fn strike<R: Rng + ?Sized>(&mut self, stage: &mut Stage<'_, R>) {
        let death_ms = stage.settings.timing.death_animation_ms;
        let effect_ms = stage.settings.timing.effect_ms;
        let until_ms = stage.now_ms.saturating_add(death_ms);
        let struck = stage.registry.get_mut(&self.target).map(|entity| {
            entity.lifecycle = Lifecycle::Dead { until_ms };
            entity.frozen = true;
            entity.speech = None;
            scene::sanitize(entity.position, &stage.settings.scene)
        });
        if let Some(position) = struck {
            stage.raise(EffectKind::Bite, position, effect_ms);
        }
        self.enter(PredationPhase::Strike, stage.now_ms);
    }

    fn hold<R: Rng + ?Sized>(&mut self, stage: &Stage<'_, R>) {
        let pause = stage.settings.events.predation.strike_ms;
        if stage.now_ms.saturating_sub(self.phase_started_ms) >= pause {
            self.enter(PredationPhase::Withdraw, stage.now_ms);
        }
    }

    fn withdraw<R: Rng + ?Sized>(&mut self, stage: &Stage<'_, R>) {
        let Some(path) = self.path else {
            self.enter(PredationPhase::Complete, stage.now_ms);
            return;
        };
        let duration = stage.settings.events.predation.withdraw_ms;
        let t = progress(self.phase_started_ms, stage.now_ms, duration);
        self.attacker = Some(scene::lerp(path.strike, path.exit, t));
        if t >= 1.0 {
            self.enter(PredationPhase::Complete, stage.now_ms);
        }
    }

    /// Remove attacker and target; keep the identity out for the grace window.
    fn complete<R: Rng + ?Sized>(&mut self, stage: &mut Stage<'_, R>) -> EventReport {
        self.attacker = None;
        if let Some(entity) = stage.registry.get_mut(&self.target) {
            entity.release(self.id);
            entity.lifecycle = Lifecycle::Removed;
        }
        let grace_until = stage
            .now_ms
            .saturating_add(stage.settings.timing.suppression_grace_ms);
        stage.registry.suppress(self.target.clone(), grace_until);

        EventReport {
            id: self.id,
            kind: EventKind::Predation,
            participants: vec![self.target.clone()],
            sync: None,
            winner: None,
            started_ms: self.started_ms,
            finished_ms: stage.now_ms,
        }
    }

    /// Render projection.
    pub fn view(&self) -> EventView {
        EventView {
            id: self.id,
            kind: EventKind::Predation,
            phase: self.phase.name().to_owned(),
            participants: vec![self.target.clone()],
            attacker: self
                .attacker
                .zip(self.path)
                .map(|(position, path)| AttackerView {
                    position,
                    facing: path.facing,
                }),
        }
    }
}
