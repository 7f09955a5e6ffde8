//! Race: two creatures line up and sprint to the finish threshold.
//!
//! Speeds are perturbed independently every tick: a small chance of a
//! burst, a smaller chance of a stumble, and light decay toward a floor,
//! always clamped so nobody stalls or teleports. The first runner across
//! the finish threshold wins and is reported to the controller.

use rand::Rng;
use shoal_types::{EffectKind, EventId, EventKind, EventView, Facing, Point, SyncOutcome, ViewerKey};
use tracing::{debug, info, warn};

use super::wait::{ArrivalWait, WaitPoll};
use super::{EventReport, RaceResult, Stage};
use crate::config::{AppConfig, RaceTuning};
use crate::entity::{EventClaim, RaceState};
use crate::registry::Registry;

/// Race phases, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RacePhase {
    /// Both swimming to the start line.
    ApproachStart,
    /// Frozen on the line.
    Ready,
    /// Sprinting.
    Running,
    /// Brief pause after the finish.
    Finished,
}

impl RacePhase {
    /// Phase name used in frames and logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::ApproachStart => "approach_start",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Finished => "finished",
        }
    }
}

#[derive(Debug, Clone)]
struct Runner {
    key: ViewerKey,
    start: Point,
}

/// One race.
#[derive(Debug, Clone)]
pub struct Race {
    id: EventId,
    runners: [Runner; 2],
    phase: RacePhase,
    phase_started_ms: u64,
    started_ms: u64,
    wait: ArrivalWait,
    winner: Option<ViewerKey>,
}

/// Apply one tick of burst, stumble, and decay to a runner's speed.
///
/// Non-finite input restarts from the base speed. The result is always
/// inside `min_speed..=max_speed`.
pub fn perturb_speed<R: Rng + ?Sized>(speed: f64, tuning: &RaceTuning, rng: &mut R) -> f64 {
    let mut next = if speed.is_finite() {
        speed
    } else {
        tuning.base_speed
    };
    if rng.random_bool(tuning.burst_chance.clamp(0.0, 1.0)) {
        next += tuning.burst_amount;
    } else if rng.random_bool(tuning.stumble_chance.clamp(0.0, 1.0)) {
        next *= tuning.stumble_factor;
    }
    next = (next - tuning.floor_speed).mul_add(tuning.decay, tuning.floor_speed);
    if next.is_finite() {
        next.clamp(tuning.min_speed, tuning.max_speed)
    } else {
        tuning.base_speed.clamp(tuning.min_speed, tuning.max_speed)
    }
}

impl Race {
    /// Pick a shared random lane and lay out both start spots.
    pub(crate) fn new<R: Rng + ?Sized>(
        id: EventId,
        participants: [ViewerKey; 2],
        settings: &AppConfig,
        now_ms: u64,
        rng: &mut R,
    ) -> Self {
        let tuning = &settings.events.race;
        let (min_y, max_y) = settings.scene.band();
        let half_gap = tuning.lane_gap / 2.0;
        let (lo, hi) = (min_y + half_gap, max_y - half_gap);
        let lane = if lo <= hi {
            rng.random_range(lo..=hi)
        } else {
            f64::midpoint(min_y, max_y)
        };

        let [first, second] = participants;
        Self {
            id,
            runners: [
                Runner {
                    key: first,
                    start: Point::new(tuning.start_x, lane - half_gap),
                },
                Runner {
                    key: second,
                    start: Point::new(tuning.start_x, lane + half_gap),
                },
            ],
            phase: RacePhase::ApproachStart,
            phase_started_ms: now_ms,
            started_ms: now_ms,
            wait: ArrivalWait::new(now_ms, &settings.events.sync),
            winner: None,
        }
    }

    /// Claim both runners and point them at the start line.
    pub(crate) fn engage(&self, registry: &mut Registry) {
        for runner in &self.runners {
            if let Some(entity) = registry.get_mut(&runner.key) {
                entity.claim = EventClaim::Race(self.id);
                entity.target = runner.start;
            }
        }
    }

    /// Current phase.
    pub const fn phase(&self) -> RacePhase {
        self.phase
    }

    /// Winner, once decided.
    pub const fn winner(&self) -> Option<&ViewerKey> {
        self.winner.as_ref()
    }

    /// Runners in trigger order.
    pub fn participants(&self) -> Vec<ViewerKey> {
        self.runners.iter().map(|r| r.key.clone()).collect()
    }

    pub(crate) fn step<R: Rng + ?Sized>(&mut self, stage: &mut Stage<'_, R>) -> Option<EventReport> {
        let present = self.runners.iter().filter(|r| stage.is_present(&r.key)).count();
        match self.phase {
            RacePhase::ApproachStart | RacePhase::Ready if present < 2 => {
                debug!(event_id = %self.id, "race runner left before the start");
                self.wait.cancel();
                return Some(self.release(stage));
            }
            RacePhase::Running if present == 0 => {
                debug!(event_id = %self.id, "every runner left mid-race");
                return Some(self.release(stage));
            }
            _ => {}
        }

        match self.phase {
            RacePhase::ApproachStart => self.approach_start(stage),
            RacePhase::Ready => self.ready(stage),
            RacePhase::Running => self.run(stage),
            RacePhase::Finished => {
                let pause = stage.settings.events.race.finished_ms;
                if stage.now_ms.saturating_sub(self.phase_started_ms) >= pause {
                    return Some(self.release(stage));
                }
            }
        }
        None
    }

    fn enter(&mut self, phase: RacePhase, now_ms: u64) {
        debug!(event_id = %self.id, phase = phase.name(), "race phase");
        self.phase = phase;
        self.phase_started_ms = now_ms;
    }

    fn approach_start<R: Rng + ?Sized>(&mut self, stage: &mut Stage<'_, R>) {
        let factor = stage.settings.events.race.approach_speed_factor;
        for runner in &self.runners {
            stage.drive_toward(&runner.key, runner.start, factor);
        }

        let tolerance = stage.settings.events.sync.tolerance;
        let runners = &self.runners;
        let arrived = || runners.iter().all(|r| stage.is_near(&r.key, r.start, tolerance));
        if let WaitPoll::Done(outcome) = self.wait.poll(stage.now_ms, arrived) {
            if outcome != SyncOutcome::Arrived {
                warn!(event_id = %self.id, ?outcome, "race starting without arrival");
            }
            self.snap_to_line(stage);
            self.enter(RacePhase::Ready, stage.now_ms);
        }
    }

    fn snap_to_line<R: Rng + ?Sized>(&self, stage: &mut Stage<'_, R>) {
        for runner in &self.runners {
            if let Some(entity) = stage.registry.get_mut(&runner.key) {
                entity.position = runner.start;
                entity.target = runner.start;
                entity.facing = Facing::Right;
                entity.frozen = true;
            }
        }
    }

    fn ready<R: Rng + ?Sized>(&mut self, stage: &mut Stage<'_, R>) {
        let tuning = &stage.settings.events.race;
        if stage.now_ms.saturating_sub(self.phase_started_ms) < tuning.ready_ms {
            return;
        }
        for runner in &self.runners {
            if let Some(entity) = stage.registry.get_mut(&runner.key) {
                entity.frozen = false;
                entity.race = Some(RaceState {
                    speed: tuning.base_speed,
                    progress: 0.0,
                });
            }
        }
        self.enter(RacePhase::Running, stage.now_ms);
    }

    /// Advance both runners; the first across the threshold wins.
    fn run<R: Rng + ?Sized>(&mut self, stage: &mut Stage<'_, R>) {
        let tuning = &stage.settings.events.race;
        let width = stage.settings.scene.width;
        let course = (tuning.finish_x - tuning.start_x).max(f64::EPSILON);

        let mut positions: Vec<(usize, f64)> = Vec::with_capacity(2);
        for (index, runner) in self.runners.iter().enumerate() {
            let Some(entity) = stage
                .registry
                .get_mut(&runner.key)
                .filter(|e| e.is_live())
            else {
                continue;
            };
            let current = entity.race.map_or(tuning.base_speed, |state| state.speed);
            let speed = perturb_speed(current, tuning, stage.rng);
            let x = if entity.position.x.is_finite() {
                entity.position.x
            } else {
                tuning.start_x
            };
            let next_x = (x + speed).clamp(0.0, width);
            entity.position = Point::new(next_x, runner.start.y);
            entity.target = Point::new(tuning.finish_x, runner.start.y);
            entity.facing = Facing::Right;
            entity.race = Some(RaceState {
                speed,
                progress: ((next_x - tuning.start_x) / course).clamp(0.0, 1.0),
            });
            positions.push((index, next_x));
        }

        let crossed = positions.iter().any(|(_, x)| *x >= tuning.finish_x);
        let expired = stage.now_ms.saturating_sub(self.phase_started_ms) >= tuning.max_running_ms;
        if !(crossed || expired) {
            return;
        }
        if expired && !crossed {
            warn!(event_id = %self.id, "race hit its time cap, leader wins");
        }

        // Furthest runner wins; on a tie the earlier runner keeps the lead.
        let mut leader: Option<(usize, f64)> = None;
        for (index, x) in positions {
            if leader.is_none_or(|(_, best)| x > best) {
                leader = Some((index, x));
            }
        }
        let Some((winner_index, winner_x)) = leader else {
            return;
        };
        let Some(winner) = self.runners.get(winner_index).map(|r| r.key.clone()) else {
            return;
        };
        let runner_up = self
            .runners
            .iter()
            .find(|r| r.key != winner && stage.is_present(&r.key))
            .map(|r| r.key.clone());

        for runner in &self.runners {
            if let Some(entity) = stage.registry.get_mut(&runner.key) {
                entity.frozen = true;
            }
        }
        let finish = Point::new(winner_x.min(tuning.finish_x), self.lane_of(winner_index));
        let effect_ms = stage.settings.timing.effect_ms;
        stage.raise(EffectKind::Finish, finish, effect_ms);
        info!(event_id = %self.id, winner = %winner, runner_up = ?runner_up, "race won");
        stage.race_results.push(RaceResult {
            event_id: self.id,
            winner: winner.clone(),
            runner_up,
        });
        self.winner = Some(winner);
        self.enter(RacePhase::Finished, stage.now_ms);
    }

    fn lane_of(&self, index: usize) -> f64 {
        self.runners.get(index).map_or(0.0, |r| r.start.y)
    }

    fn release<R: Rng + ?Sized>(&mut self, stage: &mut Stage<'_, R>) -> EventReport {
        for runner in &self.runners {
            stage.release(&runner.key, self.id);
        }
        EventReport {
            id: self.id,
            kind: EventKind::Race,
            participants: self.participants(),
            sync: self.wait.outcome(),
            winner: self.winner.clone(),
            started_ms: self.started_ms,
            finished_ms: stage.now_ms,
        }
    }

    /// Render projection.
    pub fn view(&self) -> EventView {
        EventView {
            id: self.id,
            kind: EventKind::Race,
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
    use shoal_types::FeatureToggles;

    use super::*;
    use crate::choreography::Choreographer;
    use crate::choreography::tests::{keys, registry_with, run_to_completion};
    use crate::entity::Lifecycle;

    #[test]
    fn perturbed_speed_stays_in_bounds() {
        let tuning = RaceTuning {
            burst_chance: 0.5,
            stumble_chance: 0.5,
            ..RaceTuning::default()
        };
        let mut rng = SmallRng::seed_from_u64(1);
        let mut speed = tuning.base_speed;
        for _ in 0..10_000 {
            speed = perturb_speed(speed, &tuning, &mut rng);
            assert!((tuning.min_speed..=tuning.max_speed).contains(&speed));
        }
        let reset = perturb_speed(f64::NAN, &tuning, &mut rng);
        assert!(reset.is_finite());
    }

    #[test]
    fn out_of_range_chances_do_not_panic() {
        let tuning = RaceTuning {
            burst_chance: 7.0,
            stumble_chance: -1.0,
            ..RaceTuning::default()
        };
        let mut rng = SmallRng::seed_from_u64(1);
        let speed = perturb_speed(0.5, &tuning, &mut rng);
        assert!((tuning.min_speed..=tuning.max_speed).contains(&speed));
    }

    #[test]
    fn race_produces_one_winner_and_releases_both() {
        let settings = AppConfig::default();
        let mut registry = registry_with(&["a", "b"]);
        let mut choreo = Choreographer::new();
        let mut rng = SmallRng::seed_from_u64(33);
        assert!(choreo
            .begin_race(&mut registry, &keys(&["a", "b"]), FeatureToggles::default(), &settings, 0, &mut rng)
            .is_started());

        let (reports, results, _) = run_to_completion(&mut choreo, &mut registry, &settings, 0, &mut rng);
        assert_eq!(results.len(), 1);
        let result = results.first().unwrap();
        assert!(result.winner == ViewerKey::new("a") || result.winner == ViewerKey::new("b"));
        assert!(result.runner_up.is_some());
        assert_ne!(Some(&result.winner), result.runner_up.as_ref());

        let report = reports.first().unwrap();
        assert_eq!(report.winner.as_ref(), Some(&result.winner));
        for entity in registry.iter() {
            assert!(entity.claim.is_none());
            assert!(!entity.frozen);
            assert!(entity.race.is_none());
            assert!(entity.position.is_finite());
        }
    }

    #[test]
    fn corrupted_runner_position_is_recovered() {
        let settings = AppConfig::default();
        let mut registry = registry_with(&["a", "b"]);
        let mut choreo = Choreographer::new();
        let mut rng = SmallRng::seed_from_u64(34);
        choreo.begin_race(&mut registry, &keys(&["a", "b"]), FeatureToggles::default(), &settings, 0, &mut rng);

        let mut now = 0;
        while choreo
            .views()
            .first()
            .is_some_and(|v| v.phase != RacePhase::Running.name())
        {
            now += settings.timing.tick_interval_ms;
            choreo.advance(&mut registry, &settings, now, &mut rng);
        }
        let entity = registry.get_mut(&ViewerKey::new("a")).unwrap();
        entity.position = Point::new(f64::NAN, f64::NAN);
        entity.race = Some(RaceState {
            speed: f64::INFINITY,
            progress: 0.0,
        });

        let (_, results, _) = run_to_completion(&mut choreo, &mut registry, &settings, now, &mut rng);
        assert_eq!(results.len(), 1);
        assert!(registry.iter().all(|e| e.position.is_finite()));
    }

    #[test]
    fn runner_leaving_mid_race_hands_win_to_other() {
        let settings = AppConfig::default();
        let mut registry = registry_with(&["a", "b"]);
        let mut choreo = Choreographer::new();
        let mut rng = SmallRng::seed_from_u64(35);
        choreo.begin_race(&mut registry, &keys(&["a", "b"]), FeatureToggles::default(), &settings, 0, &mut rng);

        let mut now = 0;
        while choreo
            .views()
            .first()
            .is_some_and(|v| v.phase != RacePhase::Running.name())
        {
            now += settings.timing.tick_interval_ms;
            choreo.advance(&mut registry, &settings, now, &mut rng);
        }
        registry.get_mut(&ViewerKey::new("a")).unwrap().lifecycle = Lifecycle::Removed;

        let (_, results, _) = run_to_completion(&mut choreo, &mut registry, &settings, now, &mut rng);
        let result = results.first().unwrap();
        assert_eq!(result.winner, ViewerKey::new("b"));
        assert_eq!(result.runner_up, None);
    }

    #[test]
    fn race_start_wait_times_out_and_still_finishes() {
        let settings = AppConfig::default();
        let mut registry = registry_with(&["a", "b"]);
        let mut choreo = Choreographer::new();
        let mut rng = SmallRng::seed_from_u64(36);
        choreo.begin_race(&mut registry, &keys(&["a", "b"]), FeatureToggles::default(), &settings, 0, &mut rng);
        registry.get_mut(&ViewerKey::new("b")).unwrap().speed = 0.000_001;

        let (reports, results, end) = run_to_completion(&mut choreo, &mut registry, &settings, 0, &mut rng);
        assert_eq!(reports.first().unwrap().sync, Some(SyncOutcome::TimedOut));
        assert_eq!(results.len(), 1);
        let tuning = &settings.events.race;
        let bound = settings.events.sync.timeout_ms
            + tuning.ready_ms
            + tuning.max_running_ms
            + tuning.finished_ms
            + 10 * settings.timing.tick_interval_ms;
        assert!(end <= bound);
        assert!(registry.iter().all(|e| e.claim.is_none() && !e.frozen));
    }
}
