//! The simulation: owned state plus the per-tick cycle.
//!
//! Inputs arrive between ticks and are applied synchronously, so a roster
//! cycle's reconciliation always completes before that cycle's motion and
//! event consumption of its result:
//!
//! - [`Simulation::apply_roster`] -- reconcile, then hand fresh departures
//!   to predation when enabled.
//! - [`Simulation::apply_config`] -- version-guarded config update.
//! - [`Simulation::handle_trigger`] -- start an event or show speech.
//! - [`Simulation::mark_disconnected`] -- abort events, fade everyone out.
//!
//! Each tick then runs four phases:
//!
//! 1. **Clock** -- advance simulated time by one interval.
//! 2. **Lifecycle** -- finish arrivals, expire speech, end fades.
//! 3. **Motion** -- step every free-roaming entity.
//! 4. **Choreography** -- advance every active event, then purge removed
//!    entities.

use std::collections::BTreeMap;

use rand::Rng;
use shoal_types::{
    ConnectionState, DecorationPlacement, OverlayConfig, RosterEntry, SceneFrame, SkinId,
    TriggerKind, TriggerMessage, ViewerKey,
};
use tracing::{debug, info, warn};

use crate::choreography::{
    Choreographer, EventReport, PredationOrigin, RaceResult, RejectReason, TriggerOutcome,
};
use crate::clock::{ClockError, SimClock};
use crate::config::AppConfig;
use crate::context::{ApplyOutcome, ConfigChannel, OverlayContext};
use crate::entity::Lifecycle;
use crate::layout::{self, LayoutRules};
use crate::motion::{self, MotionReport};
use crate::registry::{LifecycleReport, ReconcileOutcome, Registry};

/// Errors that can occur during tick execution.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// A clock operation failed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },
}

/// Summary of a single tick.
#[derive(Debug, Clone, Default)]
pub struct TickSummary {
    /// The tick number that was executed.
    pub tick: u64,
    /// Simulated time after the tick.
    pub now_ms: u64,
    /// Entities in the registry after the purge.
    pub entities: usize,
    /// Events still active after the tick.
    pub active_events: usize,
    /// Lifecycle transitions.
    pub lifecycle: LifecycleReport,
    /// Free-roam motion.
    pub motion: MotionReport,
    /// Events that finished this tick.
    pub finished: Vec<EventReport>,
    /// Races decided this tick.
    pub race_results: Vec<RaceResult>,
    /// Entities purged from the registry.
    pub purged: usize,
}

/// Owned simulation state.
#[derive(Debug)]
pub struct Simulation<R> {
    clock: SimClock,
    registry: Registry,
    choreographer: Choreographer,
    context: OverlayContext,
    settings: AppConfig,
    layout_rules: LayoutRules,
    layout: Vec<DecorationPlacement>,
    rng: R,
}

impl<R: Rng> Simulation<R> {
    /// Build an empty, disconnected simulation.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::Clock`] if the tick interval is zero.
    pub fn new(settings: AppConfig, rng: R) -> Result<Self, TickError> {
        let clock = SimClock::new(settings.timing.tick_interval_ms)?;
        let context = OverlayContext::new(&settings.streamer);
        let layout_rules = LayoutRules::from_scene(&settings.scene);
        let config = context.config.config();
        let layout = layout::layout(&config.active_decoration_ids, config.scene_seed, &layout_rules);
        Ok(Self {
            clock,
            registry: Registry::new(),
            choreographer: Choreographer::new(),
            context,
            settings,
            layout_rules,
            layout,
            rng,
        })
    }

    /// Reconcile a roster snapshot. A successful roster means the link is up.
    pub fn apply_roster(&mut self, roster: &[RosterEntry]) -> ReconcileOutcome {
        if self.context.set_connection(ConnectionState::Connected) {
            info!(tick = self.clock.tick(), "controller connected");
        }
        let now_ms = self.clock.now_ms();
        let outcome =
            self.registry
                .reconcile(roster, &self.context, &self.settings, now_ms, &mut self.rng);

        let toggles = self.context.config.toggles();
        if toggles.predation {
            for key in &outcome.departed {
                let started = self.choreographer.begin_predation(
                    &mut self.registry,
                    key,
                    PredationOrigin::Departure,
                    toggles,
                    now_ms,
                );
                if !started.is_started() {
                    debug!(identity = %key, ?started, "departure left to fade");
                }
            }
        }

        debug!(
            tick = self.clock.tick(),
            created = outcome.created.len(),
            refreshed = outcome.refreshed,
            departed = outcome.departed.len(),
            filtered = outcome.filtered,
            "roster reconciled"
        );
        outcome
    }

    /// Merge a batched skin lookup into the session cache.
    pub fn record_skins(&mut self, lookups: BTreeMap<ViewerKey, SkinId>) {
        if !lookups.is_empty() {
            self.context.skins.record(lookups);
        }
    }

    /// Enter the disconnected state: abort every event, fade everyone out,
    /// and create nothing until a roster arrives again.
    ///
    /// Returns `true` if the state changed.
    pub fn mark_disconnected(&mut self) -> bool {
        if !self.context.set_connection(ConnectionState::Disconnected) {
            return false;
        }
        let aborted = self.choreographer.abort_all(&mut self.registry);
        let departing = self
            .registry
            .depart_all(self.clock.now_ms(), self.settings.timing.departure_fade_ms);
        warn!(tick = self.clock.tick(), aborted, departing, "controller disconnected");
        true
    }

    /// Offer a broadcaster config; the layout is recomputed when it applies.
    pub fn apply_config(&mut self, config: OverlayConfig, channel: ConfigChannel) -> ApplyOutcome {
        let outcome = self.context.config.apply(config, channel);
        if outcome.is_applied() {
            let config = self.context.config.config();
            self.layout = layout::layout(
                &config.active_decoration_ids,
                config.scene_seed,
                &self.layout_rules,
            );
        }
        outcome
    }

    /// Act on an inbound trigger. Invalid triggers are dropped as no-ops.
    pub fn handle_trigger(&mut self, trigger: &TriggerMessage) -> TriggerOutcome {
        if !trigger.is_for(self.context.streamer()) {
            debug!(streamer = %trigger.streamer, "trigger for another channel");
            return TriggerOutcome::Rejected(RejectReason::WrongChannel);
        }
        let toggles = self.context.config.toggles();
        let now_ms = self.clock.now_ms();
        match trigger.event_kind {
            TriggerKind::Predation => {
                let [target] = trigger.participants.as_slice() else {
                    return TriggerOutcome::Rejected(RejectReason::WrongParticipantCount);
                };
                self.choreographer.begin_predation(
                    &mut self.registry,
                    target,
                    PredationOrigin::Trigger,
                    toggles,
                    now_ms,
                )
            }
            TriggerKind::Pairing => self.choreographer.begin_pairing(
                &mut self.registry,
                &trigger.participants,
                toggles,
                &self.settings,
                now_ms,
            ),
            TriggerKind::Race => self.choreographer.begin_race(
                &mut self.registry,
                &trigger.participants,
                toggles,
                &self.settings,
                now_ms,
                &mut self.rng,
            ),
            TriggerKind::Speak => self.speak(trigger),
        }
    }

    fn speak(&mut self, trigger: &TriggerMessage) -> TriggerOutcome {
        let [speaker] = trigger.participants.as_slice() else {
            return TriggerOutcome::Rejected(RejectReason::WrongParticipantCount);
        };
        let timing = &self.settings.timing;
        let text = trigger.text.as_deref().unwrap_or_default();
        let expires_at_ms = self.clock.after(timing.speech_ms);
        if self
            .registry
            .set_speech(&speaker.normalized(), text, expires_at_ms, timing.speech_max_chars)
        {
            TriggerOutcome::Spoke
        } else {
            TriggerOutcome::Rejected(RejectReason::UnknownParticipant)
        }
    }

    /// Run one tick.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::Clock`] if simulated time would overflow.
    pub fn run_tick(&mut self) -> Result<TickSummary, TickError> {
        let now_ms = self.clock.advance()?;
        let lifecycle = self.registry.advance_lifecycles(now_ms);
        let motion = motion::advance(&mut self.registry, &self.settings.scene, &mut self.rng);
        let output =
            self.choreographer
                .advance(&mut self.registry, &self.settings, now_ms, &mut self.rng);
        let purged = self.registry.purge_removed();

        for report in &output.finished {
            info!(
                tick = self.clock.tick(),
                event_id = %report.id,
                kind = %report.kind,
                participants = ?report.participants,
                sync = ?report.sync,
                winner = ?report.winner,
                "event report"
            );
        }

        Ok(TickSummary {
            tick: self.clock.tick(),
            now_ms,
            entities: self.registry.len(),
            active_events: self.choreographer.len(),
            lifecycle,
            motion,
            finished: output.finished,
            race_results: output.race_results,
            purged,
        })
    }

    /// Render projection of the current state.
    pub fn frame(&self) -> SceneFrame {
        let now_ms = self.clock.now_ms();
        SceneFrame {
            tick: self.clock.tick(),
            now_ms,
            connection: self.context.connection(),
            dock: self.settings.scene.dock,
            config_version: self.context.config.version(),
            entities: self
                .registry
                .iter()
                .filter(|e| e.lifecycle != Lifecycle::Removed)
                .map(crate::entity::Entity::view)
                .collect(),
            events: self.choreographer.views(),
            effects: self.choreographer.effect_views(now_ms),
        }
    }

    /// Current decoration placements.
    pub fn layout(&self) -> &[DecorationPlacement] {
        &self.layout
    }

    /// The entity registry.
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The choreographer.
    pub const fn choreographer(&self) -> &Choreographer {
        &self.choreographer
    }

    /// The owned overlay context.
    pub const fn context(&self) -> &OverlayContext {
        &self.context
    }

    /// The simulation clock.
    pub const fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// Local settings.
    pub const fn settings(&self) -> &AppConfig {
        &self.settings
    }

    #[cfg(test)]
    pub(crate) const fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }
}
