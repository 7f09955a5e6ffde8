//! Event choreography.
//!
//! Each active event is an explicit state machine advanced once per tick.
//! Events claim their participants exclusively through [`EventClaim`];
//! while claimed, the event is the only writer of a participant's
//! position. Every phase chain reaches a terminal phase through simulated
//! time alone, and that terminal phase releases every claim it took.
//!
//! Rejections (feature disabled, unknown or busy participant) are returned
//! as [`TriggerOutcome::Rejected`] for logging and never surface to the
//! trigger source.
//!
//! # Modules
//!
//! - [`predation`] -- `spawn → approach → strike → withdraw → complete`
//! - [`pairing`] -- `approach → snap → display → release`
//! - [`race`] -- `approach_start → ready → running → finished`
//! - [`wait`] -- bounded two-participant arrival wait

pub mod pairing;
pub mod predation;
pub mod race;
pub mod wait;

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use shoal_types::{
    EffectKind, EffectView, EventId, EventKind, EventView, FeatureToggles, Point, SyncOutcome,
    ViewerKey,
};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::entity::EventClaim;
use crate::registry::Registry;
use crate::scene;

pub use pairing::{Pairing, PairingPhase};
pub use predation::{Predation, PredationOrigin, PredationPhase};
pub use race::{Race, RacePhase, perturb_speed};
pub use wait::{ArrivalWait, WaitPoll};

/// Why a trigger did not start an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The broadcaster disabled this event kind.
    FeatureDisabled,
    /// A named participant has no entity.
    UnknownParticipant,
    /// A participant is claimed, arriving, departing, or dead.
    Unavailable,
    /// The same identity was named twice.
    DuplicateParticipant,
    /// Wrong number of participants for the event kind.
    WrongParticipantCount,
    /// The trigger was addressed to another channel.
    WrongChannel,
}

impl core::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let text = match self {
            Self::FeatureDisabled => "feature disabled",
            Self::UnknownParticipant => "unknown participant",
            Self::Unavailable => "participant unavailable",
            Self::DuplicateParticipant => "duplicate participant",
            Self::WrongParticipantCount => "wrong participant count",
            Self::WrongChannel => "addressed to another channel",
        };
        f.write_str(text)
    }
}

/// Result of asking the choreographer to start an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The event started and holds its participants.
    Started(EventId),
    /// A speech bubble was shown; no event involved.
    Spoke,
    /// Nothing happened.
    Rejected(RejectReason),
}

impl TriggerOutcome {
    /// Whether an event started.
    pub const fn is_started(self) -> bool {
        matches!(self, Self::Started(_))
    }
}

/// Summary of a finished event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventReport {
    /// Event identifier.
    pub id: EventId,
    /// Event kind.
    pub kind: EventKind,
    /// Participants, in trigger order.
    pub participants: Vec<ViewerKey>,
    /// How the arrival wait settled, for two-participant events.
    pub sync: Option<SyncOutcome>,
    /// Race winner.
    pub winner: Option<ViewerKey>,
    /// When the event started (simulated ms).
    pub started_ms: u64,
    /// When the event finished (simulated ms).
    pub finished_ms: u64,
}

/// A race that just produced a winner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceResult {
    /// The race.
    pub event_id: EventId,
    /// First across the line.
    pub winner: ViewerKey,
    /// The other runner, if still present.
    pub runner_up: Option<ViewerKey>,
}

/// What one choreography pass produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChoreoOutput {
    /// Events that reached their terminal phase.
    pub finished: Vec<EventReport>,
    /// Races decided this tick.
    pub race_results: Vec<RaceResult>,
}

/// A transient visual effect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Effect {
    /// Effect kind.
    pub kind: EffectKind,
    /// Where it is drawn.
    pub position: Point,
    /// When it disappears.
    pub expires_at_ms: u64,
}

impl Effect {
    fn view(&self, now_ms: u64) -> EffectView {
        EffectView {
            kind: self.kind,
            position: self.position,
            remaining_ms: self.expires_at_ms.saturating_sub(now_ms),
        }
    }
}

/// Everything an event may touch while stepping.
pub(crate) struct Stage<'a, R: Rng + ?Sized> {
    pub(crate) registry: &'a mut Registry,
    pub(crate) settings: &'a AppConfig,
    pub(crate) now_ms: u64,
    pub(crate) rng: &'a mut R,
    pub(crate) effects: &'a mut Vec<Effect>,
    pub(crate) race_results: &'a mut Vec<RaceResult>,
}

impl<R: Rng + ?Sized> Stage<'_, R> {
    /// Raise an effect lasting `duration_ms`.
    pub(crate) fn raise(&mut self, kind: EffectKind, position: Point, duration_ms: u64) {
        self.effects.push(Effect {
            kind,
            position,
            expires_at_ms: self.now_ms.saturating_add(duration_ms),
        });
    }

    /// Release a participant back to free roam with a fresh wander target.
    pub(crate) fn release(&mut self, key: &ViewerKey, event: EventId) -> bool {
        let scene_config = &self.settings.scene;
        let Some(entity) = self.registry.get_mut(key) else {
            return false;
        };
        if !entity.release(event) {
            return false;
        }
        entity.position = scene::clamp_to_bounds(scene::sanitize(entity.position, scene_config), scene_config);
        entity.target = scene::random_point_in_band(scene_config, self.rng);
        entity.facing = scene::facing_toward(entity.position.x, entity.target.x, entity.facing);
        true
    }

    /// Whether the participant still has an entity an event can drive.
    pub(crate) fn is_present(&self, key: &ViewerKey) -> bool {
        self.registry.get(key).is_some_and(crate::entity::Entity::is_live)
    }

    /// Move a claimed participant toward `spot` at its wander speed times
    /// `factor` (validated positive at load). Corrupted state is reset first.
    pub(crate) fn drive_toward(&mut self, key: &ViewerKey, spot: Point, factor: f64) {
        let scene_config = &self.settings.scene;
        let Some(entity) = self.registry.get_mut(key) else {
            return;
        };
        entity.position = scene::sanitize(entity.position, scene_config);
        if !(entity.speed.is_finite() && entity.speed > 0.0) {
            entity.speed = scene_config.min_speed;
        }
        let step = entity.speed * factor;
        let next = scene::step_toward(entity.position, spot, step);
        entity.facing = scene::facing_toward(entity.position.x, next.x, entity.facing);
        entity.position = scene::clamp_to_bounds(next, scene_config);
        entity.target = spot;
    }

    /// Whether the participant is within `tolerance` of `spot`.
    pub(crate) fn is_near(&self, key: &ViewerKey, spot: Point, tolerance: f64) -> bool {
        self.registry
            .get(key)
            .is_some_and(|e| e.position.is_finite() && e.position.distance(spot) <= tolerance)
    }
}

/// One active event.
#[derive(Debug, Clone)]
pub enum ActiveEvent {
    /// Predation.
    Predation(Predation),
    /// Pairing.
    Pairing(Pairing),
    /// Race.
    Race(Race),
}

impl ActiveEvent {
    fn step<R: Rng + ?Sized>(&mut self, stage: &mut Stage<'_, R>) -> Option<EventReport> {
        match self {
            Self::Predation(event) => event.step(stage),
            Self::Pairing(event) => event.step(stage),
            Self::Race(event) => event.step(stage),
        }
    }

    /// Participants currently held.
    pub fn participants(&self) -> Vec<ViewerKey> {
        match self {
            Self::Predation(event) => vec![event.target().clone()],
            Self::Pairing(event) => event.participants(),
            Self::Race(event) => event.participants(),
        }
    }

    /// Event kind.
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Predation(_) => EventKind::Predation,
            Self::Pairing(_) => EventKind::Pairing,
            Self::Race(_) => EventKind::Race,
        }
    }

    /// Render projection.
    pub fn view(&self) -> EventView {
        match self {
            Self::Predation(event) => event.view(),
            Self::Pairing(event) => event.view(),
            Self::Race(event) => event.view(),
        }
    }
}

/// Owner of every active event and live effect.
#[derive(Debug, Clone, Default)]
pub struct Choreographer {
    events: BTreeMap<EventId, ActiveEvent>,
    effects: Vec<Effect>,
}

impl Choreographer {
    /// Create an idle choreographer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a predation against one entity.
    ///
    /// A trigger may only target an active, unclaimed entity. A departure
    /// may target an unclaimed entity that has just started departing.
    pub fn begin_predation(
        &mut self,
        registry: &mut Registry,
        target: &ViewerKey,
        origin: PredationOrigin,
        toggles: FeatureToggles,
        now_ms: u64,
    ) -> TriggerOutcome {
        if !toggles.predation {
            return reject(EventKind::Predation, RejectReason::FeatureDisabled);
        }
        let key = target.normalized();
        let Some(entity) = registry.get_mut(&key) else {
            return reject(EventKind::Predation, RejectReason::UnknownParticipant);
        };
        let eligible = match origin {
            PredationOrigin::Trigger => entity.is_claimable(),
            PredationOrigin::Departure => {
                entity.claim.is_none()
                    && matches!(entity.lifecycle, crate::entity::Lifecycle::Departing { .. })
            }
        };
        if !eligible {
            return reject(EventKind::Predation, RejectReason::Unavailable);
        }

        let id = EventId::new();
        entity.claim = EventClaim::Predation(id);
        info!(event_id = %id, kind = %EventKind::Predation, identity = %key, ?origin, "event started");
        self.events
            .insert(id, ActiveEvent::Predation(Predation::new(id, key, now_ms)));
        TriggerOutcome::Started(id)
    }

    /// Start a pairing between two active, unclaimed entities.
    pub fn begin_pairing(
        &mut self,
        registry: &mut Registry,
        participants: &[ViewerKey],
        toggles: FeatureToggles,
        settings: &AppConfig,
        now_ms: u64,
    ) -> TriggerOutcome {
        if !toggles.pairing {
            return reject(EventKind::Pairing, RejectReason::FeatureDisabled);
        }
        let (a, b) = match claimable_pair(registry, participants) {
            Ok(pair) => pair,
            Err(reason) => return reject(EventKind::Pairing, reason),
        };

        let id = EventId::new();
        let (Some(first), Some(second)) = (registry.get(&a), registry.get(&b)) else {
            return reject(EventKind::Pairing, RejectReason::UnknownParticipant);
        };
        let event = Pairing::new(id, first, second, settings, now_ms);
        event.engage(registry);
        info!(event_id = %id, kind = %EventKind::Pairing, first = %a, second = %b, "event started");
        self.events.insert(id, ActiveEvent::Pairing(event));
        TriggerOutcome::Started(id)
    }

    /// Start a race between two active, unclaimed entities.
    pub fn begin_race<R: Rng + ?Sized>(
        &mut self,
        registry: &mut Registry,
        participants: &[ViewerKey],
        toggles: FeatureToggles,
        settings: &AppConfig,
        now_ms: u64,
        rng: &mut R,
    ) -> TriggerOutcome {
        if !toggles.races {
            return reject(EventKind::Race, RejectReason::FeatureDisabled);
        }
        let (a, b) = match claimable_pair(registry, participants) {
            Ok(pair) => pair,
            Err(reason) => return reject(EventKind::Race, reason),
        };

        let id = EventId::new();
        let event = Race::new(id, [a.clone(), b.clone()], settings, now_ms, rng);
        event.engage(registry);
        info!(event_id = %id, kind = %EventKind::Race, first = %a, second = %b, "event started");
        self.events.insert(id, ActiveEvent::Race(event));
        TriggerOutcome::Started(id)
    }

    /// Advance every active event by one tick and expire effects.
    pub fn advance<R: Rng + ?Sized>(
        &mut self,
        registry: &mut Registry,
        settings: &AppConfig,
        now_ms: u64,
        rng: &mut R,
    ) -> ChoreoOutput {
        let mut output = ChoreoOutput::default();
        let mut stage = Stage {
            registry,
            settings,
            now_ms,
            rng,
            effects: &mut self.effects,
            race_results: &mut output.race_results,
        };

        let mut done = Vec::new();
        for (id, event) in &mut self.events {
            if let Some(report) = event.step(&mut stage) {
                info!(
                    event_id = %id,
                    kind = %report.kind,
                    sync = ?report.sync,
                    winner = ?report.winner,
                    duration_ms = report.finished_ms.saturating_sub(report.started_ms),
                    "event finished"
                );
                done.push(*id);
                output.finished.push(report);
            }
        }
        for id in done {
            self.events.remove(&id);
        }

        self.effects.retain(|effect| effect.expires_at_ms > now_ms);
        output
    }

    /// Abort every event, releasing all claims. Returns how many were aborted.
    ///
    /// Predation targets already struck keep their death animation.
    pub fn abort_all(&mut self, registry: &mut Registry) -> usize {
        let count = self.events.len();
        for (id, event) in std::mem::take(&mut self.events) {
            for key in event.participants() {
                if let Some(entity) = registry.get_mut(&key) {
                    entity.release(id);
                }
            }
            info!(event_id = %id, kind = %event.kind(), "event aborted");
        }
        count
    }

    /// Active event views in start order.
    pub fn views(&self) -> Vec<EventView> {
        self.events.values().map(ActiveEvent::view).collect()
    }

    /// Live effect views.
    pub fn effect_views(&self, now_ms: u64) -> Vec<EffectView> {
        self.effects.iter().map(|effect| effect.view(now_ms)).collect()
    }

    /// Look up an active event.
    pub fn get(&self, id: &EventId) -> Option<&ActiveEvent> {
        self.events.get(id)
    }

    /// Number of active events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no event is active.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

fn reject(kind: EventKind, reason: RejectReason) -> TriggerOutcome {
    debug!(%kind, %reason, "trigger dropped");
    TriggerOutcome::Rejected(reason)
}

/// Validate a two-participant trigger.
fn claimable_pair(
    registry: &Registry,
    participants: &[ViewerKey],
) -> Result<(ViewerKey, ViewerKey), RejectReason> {
    let [first, second] = participants else {
        return Err(RejectReason::WrongParticipantCount);
    };
    let (a, b) = (first.normalized(), second.normalized());
    let distinct: BTreeSet<&ViewerKey> = [&a, &b].into_iter().collect();
    if distinct.len() != 2 {
        return Err(RejectReason::DuplicateParticipant);
    }
    for key in [&a, &b] {
        match registry.get(key) {
            None => return Err(RejectReason::UnknownParticipant),
            Some(entity) if !entity.is_claimable() => return Err(RejectReason::Unavailable),
            Some(_) => {}
        }
    }
    Ok((a, b))
}
