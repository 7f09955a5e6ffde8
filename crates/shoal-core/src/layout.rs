//! Procedural decoration layout.
//!
//! [`layout`] is a pure function of the active decoration set, the scene
//! seed, and the layout rules. Every client computes the same arrangement
//! locally; no placement data is ever transmitted. Randomness comes from a
//! seeded `xorshift64` stream per decoration instance, mixed from the scene
//! seed, a stable FNV-1a hash of the decoration id, and the repeat index.
//! No platform random source is involved.

use std::collections::BTreeSet;

use shoal_types::{DecorationId, DecorationPlacement, DepthLayer};

use crate::config::SceneConfig;

/// Horizontal band (percent) the centerpiece is confined to.
const CENTERPIECE_BAND: (f64, f64) = (38.0, 62.0);
/// Centerpiece size range in pixels.
const CENTERPIECE_SIZE: (u32, u32) = (150, 190);
/// Horizontal band (percent) for repeated decorations.
const SCATTER_BAND: (f64, f64) = (3.0, 97.0);
/// Repeated decoration size range in pixels.
const SCATTER_SIZE: (u32, u32) = (36, 96);
/// Share of repeated decorations drawn in front of the creatures.
const FRONT_SHARE: f64 = 0.3;

/// Mixing constant shared by the seed combiner.
const MIX: u64 = 0x517c_c1b7_2722_0a95;

/// Which decoration is the centerpiece and how often the rest repeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutRules {
    /// Placed once, near the middle, behind the creatures.
    pub centerpiece: DecorationId,
    /// Instances of every other decoration.
    pub repeats: u32,
}

impl LayoutRules {
    /// Rules from the local scene configuration.
    pub fn from_scene(scene: &SceneConfig) -> Self {
        Self {
            centerpiece: scene.centerpiece_id(),
            repeats: scene.decoration_repeats,
        }
    }
}

/// Stable 64-bit FNV-1a hash of a decoration id.
pub fn stable_hash(id: &DecorationId) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    id.as_str()
        .bytes()
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(PRIME))
}

/// `xorshift64` stream for one decoration instance.
#[derive(Debug, Clone)]
struct SeededStream {
    state: u64,
}

impl SeededStream {
    fn new(scene_seed: u64, id_hash: u64, index: u32) -> Self {
        let mut state = scene_seed
            ^ id_hash.wrapping_add(u64::from(index).wrapping_add(1).wrapping_mul(MIX));
        if state == 0 {
            state = 0xdead_beef_cafe_babe;
        }
        let mut stream = Self { state };
        // Discard the first output so nearby seeds diverge.
        stream.next_u64();
        stream
    }

    const fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Uniform draw in `0.0..=1.0`.
    fn unit(&mut self) -> f64 {
        let high = u32::try_from(self.next_u64() >> 32).unwrap_or(u32::MAX);
        f64::from(high) / f64::from(u32::MAX)
    }

    fn range(&mut self, (lo, hi): (f64, f64)) -> f64 {
        (hi - lo).mul_add(self.unit(), lo)
    }

    fn range_u32(&mut self, (lo, hi): (u32, u32)) -> u32 {
        let span = u64::from(hi.saturating_sub(lo)).saturating_add(1);
        let offset = self.next_u64().checked_rem(span).unwrap_or(0);
        lo.saturating_add(u32::try_from(offset).unwrap_or(0))
    }
}

/// Arrange the active decorations.
///
/// Ids are normalized and deduplicated, so order and repetition in the
/// input do not affect the output. The result is sorted back-to-front,
/// then left-to-right.
pub fn layout(active: &[DecorationId], scene_seed: u64, rules: &LayoutRules) -> Vec<DecorationPlacement> {
    let ids: BTreeSet<DecorationId> = active
        .iter()
        .map(DecorationId::normalized)
        .filter(|id| !id.is_blank())
        .collect();
    let centerpiece = rules.centerpiece.normalized();

    let mut placements = Vec::new();
    for id in ids {
        let hash = stable_hash(&id);
        if id == centerpiece {
            let mut stream = SeededStream::new(scene_seed, hash, 0);
            placements.push(DecorationPlacement {
                horizontal_percent: stream.range(CENTERPIECE_BAND),
                size_px: stream.range_u32(CENTERPIECE_SIZE),
                depth_layer: DepthLayer::Back,
                asset_id: id,
            });
            continue;
        }
        for index in 0..rules.repeats {
            let mut stream = SeededStream::new(scene_seed, hash, index);
            let horizontal_percent = stream.range(SCATTER_BAND);
            let size_px = stream.range_u32(SCATTER_SIZE);
            let depth_layer = if stream.unit() < FRONT_SHARE {
                DepthLayer::Front
            } else {
                DepthLayer::Back
            };
            placements.push(DecorationPlacement {
                asset_id: id.clone(),
                horizontal_percent,
                size_px,
                depth_layer,
            });
        }
    }

    placements.sort_by(|a, b| {
        a.depth_layer
            .cmp(&b.depth_layer)
            .then(a.horizontal_percent.total_cmp(&b.horizontal_percent))
            .then_with(|| a.asset_id.cmp(&b.asset_id))
    });
    placements
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<DecorationId> {
        names.iter().map(DecorationId::new).collect()
    }

    fn rules() -> LayoutRules {
        LayoutRules::from_scene(&SceneConfig::default())
    }

    #[test]
    fn identical_inputs_give_bit_identical_output() {
        let active = ids(&["castle", "kelp", "rock", "coral"]);
        let first = layout(&active, 1234, &rules());
        let second = layout(&active, 1234, &rules());
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.asset_id, b.asset_id);
            assert_eq!(a.horizontal_percent.to_bits(), b.horizontal_percent.to_bits());
            assert_eq!(a.size_px, b.size_px);
            assert_eq!(a.depth_layer, b.depth_layer);
        }
    }

    #[test]
    fn input_order_and_duplicates_do_not_matter() {
        let a = layout(&ids(&["kelp", "rock", "castle"]), 9, &rules());
        let b = layout(&ids(&["Castle", "rock", "kelp", "kelp"]), 9, &rules());
        assert_eq!(a, b);
    }

    #[test]
    fn centerpiece_placed_once_in_its_band() {
        let placed = layout(&ids(&["castle", "kelp"]), 77, &rules());
        let castles: Vec<_> = placed
            .iter()
            .filter(|p| p.asset_id.as_str() == "castle")
            .collect();
        assert_eq!(castles.len(), 1);
        let castle = castles.first().copied();
        assert!(castle.is_some_and(|c| (CENTERPIECE_BAND.0..=CENTERPIECE_BAND.1)
            .contains(&c.horizontal_percent)
            && c.depth_layer == DepthLayer::Back));
        let kelp = placed.iter().filter(|p| p.asset_id.as_str() == "kelp").count();
        assert_eq!(kelp, 3);
    }

    #[test]
    fn placements_stay_in_bounds() {
        for seed in 0..200 {
            for p in layout(&ids(&["castle", "kelp", "rock"]), seed, &rules()) {
                assert!((0.0..=100.0).contains(&p.horizontal_percent));
                assert!(p.size_px >= SCATTER_SIZE.0 && p.size_px <= CENTERPIECE_SIZE.1);
            }
        }
    }

    #[test]
    fn different_seeds_differ() {
        let active = ids(&["kelp", "rock"]);
        assert_ne!(layout(&active, 1, &rules()), layout(&active, 2, &rules()));
    }

    #[test]
    fn repeated_instances_are_perturbed() {
        let placed = layout(&ids(&["kelp"]), 5, &rules());
        let xs: BTreeSet<u64> = placed.iter().map(|p| p.horizontal_percent.to_bits()).collect();
        assert_eq!(xs.len(), placed.len());
    }

    #[test]
    fn empty_set_gives_empty_layout() {
        assert!(layout(&[], 3, &rules()).is_empty());
    }

    #[test]
    fn fnv_hash_is_stable() {
        assert_eq!(stable_hash(&DecorationId::new("")), 0xcbf2_9ce4_8422_2325);
        assert_eq!(
            stable_hash(&DecorationId::new("kelp")),
            stable_hash(&DecorationId::new("KELP"))
        );
    }
}
