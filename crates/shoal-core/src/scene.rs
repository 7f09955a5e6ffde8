//! Scene geometry helpers shared by motion and choreography.

use rand::Rng;
use shoal_types::{Facing, Point};

use crate::config::SceneConfig;

/// Clamp a point into the scene rectangle.
pub fn clamp_to_bounds(point: Point, scene: &SceneConfig) -> Point {
    Point::new(
        point.x.clamp(0.0, scene.width),
        point.y.clamp(0.0, scene.height),
    )
}

/// Uniformly random point inside the wander band.
pub fn random_point_in_band<R: Rng + ?Sized>(scene: &SceneConfig, rng: &mut R) -> Point {
    let (min_y, max_y) = scene.band();
    Point::new(
        rng.random_range(0.0..=scene.width),
        rng.random_range(min_y..=max_y),
    )
}

/// Uniformly random wander speed.
pub fn random_speed<R: Rng + ?Sized>(scene: &SceneConfig, rng: &mut R) -> f64 {
    rng.random_range(scene.min_speed..=scene.max_speed)
}

/// Center of the wander band; where corrupted coordinates are reset to.
pub fn safe_default(scene: &SceneConfig) -> Point {
    let (min_y, max_y) = scene.band();
    Point::new(scene.width / 2.0, (min_y + max_y) / 2.0)
}

/// Replace a non-finite point with the safe default.
pub fn sanitize(point: Point, scene: &SceneConfig) -> Point {
    if point.is_finite() {
        point
    } else {
        safe_default(scene)
    }
}

/// Move from `from` toward `to` by at most `max_step`, never overshooting.
pub fn step_toward(from: Point, to: Point, max_step: f64) -> Point {
    let distance = from.distance(to);
    if distance <= max_step || distance <= f64::EPSILON {
        return to;
    }
    let ratio = max_step / distance;
    Point::new(
        (to.x - from.x).mul_add(ratio, from.x),
        (to.y - from.y).mul_add(ratio, from.y),
    )
}

/// Linear interpolation, `t` clamped to `0.0..=1.0`.
pub fn lerp(from: Point, to: Point, t: f64) -> Point {
    let t = t.clamp(0.0, 1.0);
    Point::new(
        (to.x - from.x).mul_add(t, from.x),
        (to.y - from.y).mul_add(t, from.y),
    )
}

/// Facing toward `to_x`; keeps `current` when the move is vertical.
pub fn facing_toward(from_x: f64, to_x: f64, current: Facing) -> Facing {
    let dx = to_x - from_x;
    if dx > 0.0 {
        Facing::Right
    } else if dx < 0.0 {
        Facing::Left
    } else {
        current
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    #[test]
    fn step_never_overshoots() {
        let from = Point::new(0.0, 0.0);
        let to = Point::new(1.0, 0.0);
        assert_eq!(step_toward(from, to, 5.0), to);
        let half = step_toward(from, Point::new(10.0, 0.0), 2.0);
        assert!((half.x - 2.0).abs() < 1e-9);
    }

    #[test]
    fn lerp_clamps_t() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 20.0);
        assert_eq!(lerp(a, b, 2.0), b);
        assert_eq!(lerp(a, b, -1.0), a);
        assert_eq!(lerp(a, b, 0.5), Point::new(5.0, 10.0));
    }

    #[test]
    fn random_points_stay_in_band() {
        let scene = SceneConfig::default();
        let (min_y, max_y) = scene.band();
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..500 {
            let p = random_point_in_band(&scene, &mut rng);
            assert!((0.0..=scene.width).contains(&p.x));
            assert!((min_y..=max_y).contains(&p.y));
        }
    }

    #[test]
    fn corrupted_points_reset() {
        let scene = SceneConfig::default();
        let fixed = sanitize(Point::new(f64::NAN, 3.0), &scene);
        assert_eq!(fixed, safe_default(&scene));
        let kept = Point::new(1.0, 2.0);
        assert_eq!(sanitize(kept, &scene), kept);
    }

    #[test]
    fn facing_follows_horizontal_sign() {
        assert_eq!(facing_toward(5.0, 9.0, Facing::Left), Facing::Right);
        assert_eq!(facing_toward(5.0, 1.0, Facing::Right), Facing::Left);
        assert_eq!(facing_toward(5.0, 5.0, Facing::Left), Facing::Left);
    }
}
