//! Simulation engine for the Shoal aquarium overlay.
//!
//! Every present audience member is a creature swimming in a shared scene.
//! This crate owns the simulation and performs no network I/O itself; the
//! collaborators it talks to are traits in [`source`].
//!
//! # Modules
//!
//! - [`clock`] -- Simulated time in ticks and milliseconds.
//! - [`config`] -- Local configuration loaded from `shoal-config.yaml`.
//! - [`context`] -- Owned overlay context: version-guarded broadcaster
//!   config cache, link state, hidden identities.
//! - [`skins`] -- Skin resolution, role gating, and batched lookup ledger.
//! - [`entity`] -- Per-creature state and the [`EventClaim`] ownership flag.
//! - [`registry`] -- Roster reconciliation and lifecycle timers.
//! - [`scene`] -- Geometry helpers: bounds, bands, stepping.
//! - [`motion`] -- Free-roam wandering.
//! - [`choreography`] -- Predation, pairing, and race state machines.
//! - [`layout`] -- Deterministic procedural decoration layout.
//! - [`tick`] -- The [`Simulation`] and its per-tick cycle.
//! - [`runner`] -- The async loop wiring timers, pollers, and sinks.
//! - [`source`] -- Collaborator traits and stubs.
//!
//! [`EventClaim`]: entity::EventClaim
//! [`Simulation`]: tick::Simulation

pub mod choreography;
pub mod clock;
pub mod config;
pub mod context;
pub mod entity;
pub mod layout;
pub mod motion;
pub mod registry;
pub mod runner;
pub mod scene;
pub mod skins;
pub mod source;
pub mod tick;

pub use config::AppConfig;
pub use runner::{Collaborators, FrameSink, Inbound, NoOpSink, RunSummary, RunnerError, run_overlay};
pub use source::{ConfigSource, RosterSource, SkinDirectory, SourceError, WinnerSink};
pub use tick::{Simulation, TickError, TickSummary};
