//! Free-roam motion.
//!
//! Each tick, every free-roaming entity steps toward its wander target.
//! Within the arrival tolerance a new target is drawn from the dock's
//! wander band. Claimed, frozen, arriving, and departing entities are
//! never touched here.

use rand::Rng;

use crate::config::SceneConfig;
use crate::registry::Registry;
use crate::scene;

/// What one motion pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotionReport {
    /// Entities that stepped toward their target.
    pub moved: usize,
    /// Entities that reached their target and picked a new one.
    pub retargeted: usize,
    /// Entities whose corrupted position, target, or speed was reset.
    pub sanitized: usize,
}

/// Advance every free-roaming entity by one tick.
pub fn advance<R: Rng + ?Sized>(
    registry: &mut Registry,
    scene_config: &SceneConfig,
    rng: &mut R,
) -> MotionReport {
    let mut report = MotionReport::default();

    for entity in registry.iter_mut() {
        if !entity.is_free_roaming() {
            continue;
        }

        let mut corrupted = false;
        if !entity.position.is_finite() {
            entity.position = scene::safe_default(scene_config);
            corrupted = true;
        }
        if !entity.target.is_finite() {
            entity.target = scene::random_point_in_band(scene_config, rng);
            corrupted = true;
        }
        if !(entity.speed.is_finite() && entity.speed > 0.0) {
            entity.speed = scene_config.min_speed;
            corrupted = true;
        }
        if corrupted {
            tracing::debug!(identity = %entity.key, "reset corrupted motion state");
            report.sanitized = report.sanitized.saturating_add(1);
        }

        let distance = entity.position.distance(entity.target);
        if distance <= scene_config.arrival_tolerance {
            let next = scene::random_point_in_band(scene_config, rng);
            entity.facing = scene::facing_toward(entity.position.x, next.x, entity.facing);
            entity.target = next;
            report.retargeted = report.retargeted.saturating_add(1);
        } else {
            let step = entity.speed.min(distance);
            let next = scene::step_toward(entity.position, entity.target, step);
            entity.facing = scene::facing_toward(entity.position.x, next.x, entity.facing);
            entity.position = scene::clamp_to_bounds(next, scene_config);
            report.moved = report.moved.saturating_add(1);
        }
    }

    report
}
