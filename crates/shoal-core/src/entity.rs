//! The creature representing one audience member.

use shoal_types::{
    EntityView, EventId, EventKind, Facing, LifecycleStage, Point, SkinId, ViewerKey,
};

/// Which event, if any, exclusively owns an entity.
///
/// Written only by the choreographer. While an entity is claimed the
/// choreographer is the sole writer of its position; the motion
/// controller skips it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventClaim {
    /// Free.
    #[default]
    None,
    /// Target of a predation event.
    Predation(EventId),
    /// Participant in a pairing event.
    Pairing(EventId),
    /// Participant in a race.
    Race(EventId),
}

impl EventClaim {
    /// Whether no event holds the entity.
    pub const fn is_none(self) -> bool {
        matches!(self, Self::None)
    }

    /// Event holding the entity.
    pub const fn event_id(self) -> Option<EventId> {
        match self {
            Self::None => None,
            Self::Predation(id) | Self::Pairing(id) | Self::Race(id) => Some(id),
        }
    }

    /// Kind of event holding the entity.
    pub const fn kind(self) -> Option<EventKind> {
        match self {
            Self::None => None,
            Self::Predation(_) => Some(EventKind::Predation),
            Self::Pairing(_) => Some(EventKind::Pairing),
            Self::Race(_) => Some(EventKind::Race),
        }
    }
}

/// Lifecycle with the simulated-time deadline of each timed stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Entry animation until `until_ms`.
    Arriving {
        /// When the entity joins free roam.
        until_ms: u64,
    },
    /// Free to roam or be claimed.
    Active,
    /// Exit fade until `until_ms`.
    Departing {
        /// When the fade ends.
        until_ms: u64,
    },
    /// Struck by a predator; death animation until `until_ms`.
    Dead {
        /// When the animation ends.
        until_ms: u64,
    },
    /// Awaiting purge.
    Removed,
}

impl Lifecycle {
    /// Render-facing stage.
    pub const fn stage(self) -> LifecycleStage {
        match self {
            Self::Arriving { .. } => LifecycleStage::Arriving,
            Self::Active => LifecycleStage::Active,
            Self::Departing { .. } => LifecycleStage::Departing,
            Self::Dead { .. } => LifecycleStage::Dead,
            Self::Removed => LifecycleStage::Removed,
        }
    }
}

/// An expiring speech bubble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Speech {
    /// Text shown above the creature.
    pub text: String,
    /// When the bubble disappears.
    pub expires_at_ms: u64,
}

/// Per-runner state while a race is running.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaceState {
    /// Current speed in scene units per tick.
    pub speed: f64,
    /// Fraction of the course covered, `0.0..=1.0`.
    pub progress: f64,
}

/// One creature.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Identity key.
    pub key: ViewerKey,
    /// Name drawn under the creature.
    pub display_name: String,
    /// Resolved skin.
    pub skin: SkinId,
    /// Current position.
    pub position: Point,
    /// Wander (or event) target.
    pub target: Point,
    /// Wander speed in scene units per tick.
    pub speed: f64,
    /// Sprite facing.
    pub facing: Facing,
    /// Lifecycle stage and its deadline.
    pub lifecycle: Lifecycle,
    /// Exclusive event claim.
    pub claim: EventClaim,
    /// Pinned in place by an event.
    pub frozen: bool,
    /// Active speech bubble.
    pub speech: Option<Speech>,
    /// Race runner state.
    pub race: Option<RaceState>,
}

impl Entity {
    /// Whether the motion controller owns this entity's position.
    pub fn is_free_roaming(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Active) && self.claim.is_none() && !self.frozen
    }

    /// Whether an event may claim this entity.
    pub fn is_claimable(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Active) && self.claim.is_none()
    }

    /// Whether the entity is still in the scene and can talk.
    pub const fn is_live(&self) -> bool {
        matches!(
            self.lifecycle,
            Lifecycle::Arriving { .. } | Lifecycle::Active | Lifecycle::Departing { .. }
        )
    }

    /// Release an event claim, but only if `event` still holds it.
    pub fn release(&mut self, event: EventId) -> bool {
        if self.claim.event_id() != Some(event) {
            return false;
        }
        self.claim = EventClaim::None;
        self.frozen = false;
        self.race = None;
        true
    }

    /// Render projection.
    pub fn view(&self) -> EntityView {
        EntityView {
            identity: self.key.clone(),
            display_name: self.display_name.clone(),
            skin: self.skin.clone(),
            position: self.position,
            facing: self.facing,
            stage: self.lifecycle.stage(),
            claimed_by: self.claim.kind(),
            frozen: self.frozen,
            speech: self.speech.as_ref().map(|s| s.text.clone()),
        }
    }
}
