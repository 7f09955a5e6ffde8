//! Shared type definitions for the Shoal aquarium overlay.
//!
//! This crate is the single source of truth for types that cross a process
//! boundary: roster and config payloads from external services, trigger
//! messages from the automation controller, and the scene frames consumed
//! by the overlay renderer. Types flow downstream to `TypeScript` via
//! `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Event UUIDs and normalized string keys
//! - [`enums`] -- Roles, facings, lifecycle stages, event kinds
//! - [`payloads`] -- Roster, config, trigger, and race-winner payloads
//! - [`frame`] -- Scene frame projections for the renderer

pub mod enums;
pub mod frame;
pub mod ids;
pub mod payloads;

// Re-export all public types at crate root for convenience.
pub use enums::{
    ConnectionState, DepthLayer, DockPosition, EffectKind, EventKind, Facing, LifecycleStage,
    Role, SyncOutcome, TriggerKind,
};
pub use frame::{
    AttackerView, DecorationPlacement, EffectView, EntityView, EventView, Point, SceneFrame,
};
pub use ids::{DecorationId, EventId, SkinId, ViewerKey};
pub use payloads::{FeatureToggles, OverlayConfig, RaceWinnerReport, RosterEntry, TriggerMessage};
