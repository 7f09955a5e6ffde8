//! Local overlay configuration.
//!
//! The overlay's own settings live in `shoal-config.yaml` next to the
//! binary. This module defines strongly-typed structs that mirror the YAML
//! structure and a loader that reads and validates the file. Every field
//! has a default, so an empty file (or no file) yields a working overlay.
//!
//! The broadcaster's settings ([`OverlayConfig`]) are a different thing:
//! they are remote, versioned, and cached by [`crate::context`].
//!
//! [`OverlayConfig`]: shoal_types::OverlayConfig

use std::path::Path;

use serde::Deserialize;
use shoal_types::{DecorationId, DockPosition, SkinId, ViewerKey};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but its values are unusable.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level overlay configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AppConfig {
    /// Which channel this overlay belongs to.
    #[serde(default)]
    pub streamer: StreamerConfig,

    /// Scene geometry and wander tuning.
    #[serde(default)]
    pub scene: SceneConfig,

    /// Tick rate, poll cadences, and lifecycle durations.
    #[serde(default)]
    pub timing: TimingConfig,

    /// Per-event choreography tuning.
    #[serde(default)]
    pub events: EventsConfig,

    /// Connection endpoints.
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `SHOAL_STREAMER` overrides `streamer.identity`
    /// - `NATS_URL` overrides `infrastructure.nats_url`
    /// - `SHOAL_CONFIG_API_URL` overrides `infrastructure.config_api_url`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Override selected values with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SHOAL_STREAMER") {
            self.streamer.identity = val;
        }
        self.infrastructure.apply_env_overrides();
    }

    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| {
            Err(ConfigError::Invalid {
                reason: reason.to_owned(),
            })
        };

        if self.timing.tick_interval_ms == 0 {
            return invalid("timing.tick_interval_ms must be at least 1");
        }
        if self.timing.roster_poll_ms == 0 || self.timing.config_poll_ms == 0 {
            return invalid("poll intervals must be at least 1 ms");
        }
        if !(self.scene.width > 0.0 && self.scene.height > 0.0) {
            return invalid("scene width and height must be positive");
        }
        let (band_min, band_max) = self.scene.band();
        if !(0.0..=self.scene.height).contains(&band_min)
            || !(0.0..=self.scene.height).contains(&band_max)
            || band_min > band_max
        {
            return invalid("scene wander band must lie inside the scene height");
        }
        if !(self.scene.min_speed > 0.0 && self.scene.min_speed <= self.scene.max_speed) {
            return invalid("scene speeds must satisfy 0 < min_speed <= max_speed");
        }
        if !(self.scene.arrival_tolerance > 0.0) {
            return invalid("scene.arrival_tolerance must be positive");
        }
        let race = &self.events.race;
        if !(race.min_speed > 0.0 && race.min_speed <= race.max_speed) {
            return invalid("race speeds must satisfy 0 < min_speed <= max_speed");
        }
        if race.start_x >= race.finish_x {
            return invalid("race.start_x must be left of race.finish_x");
        }
        for chance in [race.burst_chance, race.stumble_chance] {
            if !(0.0..=1.0).contains(&chance) {
                return invalid("race chances must lie in 0.0..=1.0");
            }
        }
        for factor in [
            self.events.pairing.approach_speed_factor,
            race.approach_speed_factor,
        ] {
            if !(factor.is_finite() && factor > 0.0) {
                return invalid("approach_speed_factor must be a positive number");
            }
        }
        if self.events.sync.poll_interval_ms == 0 {
            return invalid("events.sync.poll_interval_ms must be at least 1");
        }
        Ok(())
    }
}

/// Which channel the overlay serves, and who never gets a creature.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamerConfig {
    /// The streamer's channel identity.
    #[serde(default = "default_streamer_identity")]
    pub identity: String,

    /// Identities hidden locally regardless of the broadcaster's exclusion
    /// list (the streamer's own account, chat bots).
    #[serde(default)]
    pub hidden_identities: Vec<String>,

    /// Whether the streamer's own identity is hidden.
    #[serde(default = "default_true")]
    pub hide_self: bool,

    /// Skin used when an identity has no permitted preference.
    #[serde(default = "default_skin")]
    pub default_skin: String,
}

impl StreamerConfig {
    /// The channel identity as a normalized key.
    pub fn key(&self) -> ViewerKey {
        ViewerKey::new(&self.identity)
    }

    /// The fallback skin as a normalized key.
    pub fn default_skin_id(&self) -> SkinId {
        SkinId::new(&self.default_skin)
    }
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            identity: default_streamer_identity(),
            hidden_identities: Vec::new(),
            hide_self: true,
            default_skin: default_skin(),
        }
    }
}

/// Scene geometry and free-roam tuning.
///
/// Coordinates are normalized: `x` spans `0..=width`, `y` spans
/// `0..=height`, with `y` growing downward.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SceneConfig {
    /// Where the overlay is docked.
    #[serde(default)]
    pub dock: DockPosition,

    /// Scene width in scene units.
    #[serde(default = "default_extent")]
    pub width: f64,

    /// Scene height in scene units.
    #[serde(default = "default_extent")]
    pub height: f64,

    /// Wander band `(min_y, max_y)` when docked at the top.
    #[serde(default = "default_top_band")]
    pub top_band: (f64, f64),

    /// Wander band `(min_y, max_y)` when docked at the bottom.
    #[serde(default = "default_bottom_band")]
    pub bottom_band: (f64, f64),

    /// Distance at which a wander target counts as reached.
    #[serde(default = "default_arrival_tolerance")]
    pub arrival_tolerance: f64,

    /// Slowest wander speed, in scene units per tick.
    #[serde(default = "default_min_speed")]
    pub min_speed: f64,

    /// Fastest wander speed, in scene units per tick.
    #[serde(default = "default_max_speed")]
    pub max_speed: f64,

    /// Decoration placed once, as the centerpiece.
    #[serde(default = "default_centerpiece")]
    pub centerpiece: String,

    /// How many times each non-centerpiece decoration repeats.
    #[serde(default = "default_decoration_repeats")]
    pub decoration_repeats: u32,
}

impl SceneConfig {
    /// The safe vertical band `(min_y, max_y)` for the current dock.
    pub const fn band(&self) -> (f64, f64) {
        match self.dock {
            DockPosition::Top => self.top_band,
            DockPosition::Bottom => self.bottom_band,
        }
    }

    /// The centerpiece decoration id.
    pub fn centerpiece_id(&self) -> DecorationId {
        DecorationId::new(&self.centerpiece)
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            dock: DockPosition::default(),
            width: default_extent(),
            height: default_extent(),
            top_band: default_top_band(),
            bottom_band: default_bottom_band(),
            arrival_tolerance: default_arrival_tolerance(),
            min_speed: default_min_speed(),
            max_speed: default_max_speed(),
            centerpiece: default_centerpiece(),
            decoration_repeats: default_decoration_repeats(),
        }
    }
}

/// Tick rate, poll cadences, and lifecycle durations (milliseconds).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TimingConfig {
    /// Motion tick interval.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Roster request cadence.
    #[serde(default = "default_roster_poll_ms")]
    pub roster_poll_ms: u64,

    /// How long a roster request may take before the link counts as down.
    #[serde(default = "default_roster_timeout_ms")]
    pub roster_timeout_ms: u64,

    /// Fallback config poll cadence (pushes arrive independently).
    #[serde(default = "default_config_poll_ms")]
    pub config_poll_ms: u64,

    /// Entry animation length.
    #[serde(default = "default_arrival_ms")]
    pub arrival_ms: u64,

    /// Exit fade length.
    #[serde(default = "default_departure_fade_ms")]
    pub departure_fade_ms: u64,

    /// Death animation length after a predator strikes.
    #[serde(default = "default_death_animation_ms")]
    pub death_animation_ms: u64,

    /// How long an eaten identity is kept out of the scene.
    #[serde(default = "default_suppression_grace_ms")]
    pub suppression_grace_ms: u64,

    /// Speech bubble lifetime.
    #[serde(default = "default_speech_ms")]
    pub speech_ms: u64,

    /// Longest speech text kept, in characters.
    #[serde(default = "default_speech_max_chars")]
    pub speech_max_chars: usize,

    /// Lifetime of transient effects (bite, finish flag).
    #[serde(default = "default_effect_ms")]
    pub effect_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            roster_poll_ms: default_roster_poll_ms(),
            roster_timeout_ms: default_roster_timeout_ms(),
            config_poll_ms: default_config_poll_ms(),
            arrival_ms: default_arrival_ms(),
            departure_fade_ms: default_departure_fade_ms(),
            death_animation_ms: default_death_animation_ms(),
            suppression_grace_ms: default_suppression_grace_ms(),
            speech_ms: default_speech_ms(),
            speech_max_chars: default_speech_max_chars(),
            effect_ms: default_effect_ms(),
        }
    }
}

/// Per-event choreography tuning.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EventsConfig {
    /// Predation timing and geometry.
    #[serde(default)]
    pub predation: PredationTuning,

    /// Pairing timing and geometry.
    #[serde(default)]
    pub pairing: PairingTuning,

    /// Race timing, geometry, and speed model.
    #[serde(default)]
    pub race: RaceTuning,

    /// Two-participant arrival wait.
    #[serde(default)]
    pub sync: SyncTuning,
}

/// Predation timing and geometry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PredationTuning {
    /// Time for the attacker to swim from the edge to the strike point.
    #[serde(default = "default_predation_approach_ms")]
    pub approach_ms: u64,

    /// Pause at the strike point.
    #[serde(default = "default_predation_strike_ms")]
    pub strike_ms: u64,

    /// Time for the attacker to leave the scene.
    #[serde(default = "default_predation_withdraw_ms")]
    pub withdraw_ms: u64,

    /// How far beyond the scene edge the attacker enters and exits.
    #[serde(default = "default_offscreen_margin")]
    pub offscreen_margin: f64,

    /// Horizontal gap between the attacker and the target at the strike.
    #[serde(default = "default_strike_gap")]
    pub strike_gap: f64,
}

impl Default for PredationTuning {
    fn default() -> Self {
        Self {
            approach_ms: default_predation_approach_ms(),
            strike_ms: default_predation_strike_ms(),
            withdraw_ms: default_predation_withdraw_ms(),
            offscreen_margin: default_offscreen_margin(),
            strike_gap: default_strike_gap(),
        }
    }
}

/// Pairing timing and geometry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PairingTuning {
    /// Horizontal gap between the two participants at the midpoint.
    #[serde(default = "default_pairing_gap")]
    pub gap: f64,

    /// How long the shared effect is displayed.
    #[serde(default = "default_pairing_display_ms")]
    pub display_ms: u64,

    /// Multiplier on wander speed while converging.
    #[serde(default = "default_approach_speed_factor")]
    pub approach_speed_factor: f64,
}

impl Default for PairingTuning {
    fn default() -> Self {
        Self {
            gap: default_pairing_gap(),
            display_ms: default_pairing_display_ms(),
            approach_speed_factor: default_approach_speed_factor(),
        }
    }
}

/// Race timing, geometry, and speed model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RaceTuning {
    /// Horizontal position of the start line.
    #[serde(default = "default_race_start_x")]
    pub start_x: f64,

    /// Horizontal position of the finish threshold.
    #[serde(default = "default_race_finish_x")]
    pub finish_x: f64,

    /// Vertical gap between the two lanes.
    #[serde(default = "default_lane_gap")]
    pub lane_gap: f64,

    /// Suspense delay with both runners frozen on the line.
    #[serde(default = "default_race_ready_ms")]
    pub ready_ms: u64,

    /// Pause after the finish before runners are released.
    #[serde(default = "default_race_finished_ms")]
    pub finished_ms: u64,

    /// Hard cap on the running phase; the leader wins when it expires.
    #[serde(default = "default_race_max_running_ms")]
    pub max_running_ms: u64,

    /// Multiplier on wander speed while heading to the start line.
    #[serde(default = "default_approach_speed_factor")]
    pub approach_speed_factor: f64,

    /// Speed at the starting gun, in scene units per tick.
    #[serde(default = "default_race_base_speed")]
    pub base_speed: f64,

    /// Lowest speed a runner can drop to.
    #[serde(default = "default_race_min_speed")]
    pub min_speed: f64,

    /// Highest speed a runner can reach.
    #[serde(default = "default_race_max_speed")]
    pub max_speed: f64,

    /// Speed that decay settles toward.
    #[serde(default = "default_race_floor_speed")]
    pub floor_speed: f64,

    /// Per-tick chance of a burst.
    #[serde(default = "default_burst_chance")]
    pub burst_chance: f64,

    /// Speed added by a burst.
    #[serde(default = "default_burst_amount")]
    pub burst_amount: f64,

    /// Per-tick chance of a stumble.
    #[serde(default = "default_stumble_chance")]
    pub stumble_chance: f64,

    /// Factor a stumble multiplies speed by.
    #[serde(default = "default_stumble_factor")]
    pub stumble_factor: f64,

    /// Per-tick retention of speed above the floor.
    #[serde(default = "default_decay")]
    pub decay: f64,
}

impl Default for RaceTuning {
    fn default() -> Self {
        Self {
            start_x: default_race_start_x(),
            finish_x: default_race_finish_x(),
            lane_gap: default_lane_gap(),
            ready_ms: default_race_ready_ms(),
            finished_ms: default_race_finished_ms(),
            max_running_ms: default_race_max_running_ms(),
            approach_speed_factor: default_approach_speed_factor(),
            base_speed: default_race_base_speed(),
            min_speed: default_race_min_speed(),
            max_speed: default_race_max_speed(),
            floor_speed: default_race_floor_speed(),
            burst_chance: default_burst_chance(),
            burst_amount: default_burst_amount(),
            stumble_chance: default_stumble_chance(),
            stumble_factor: default_stumble_factor(),
            decay: default_decay(),
        }
    }
}

/// Two-participant arrival wait.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SyncTuning {
    /// How often arrival is checked.
    #[serde(default = "default_sync_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Hard deadline after which the event proceeds anyway.
    #[serde(default = "default_sync_timeout_ms")]
    pub timeout_ms: u64,

    /// Distance at which a participant counts as on its mark.
    #[serde(default = "default_sync_tolerance")]
    pub tolerance: f64,
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_sync_poll_interval_ms(),
            timeout_ms: default_sync_timeout_ms(),
            tolerance: default_sync_tolerance(),
        }
    }
}

/// Connection endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InfrastructureConfig {
    /// NATS URL of the local automation controller bridge.
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// Base URL of the broadcaster configuration service.
    #[serde(default = "default_config_api_url")]
    pub config_api_url: String,

    /// Host the overlay frame server binds to.
    #[serde(default = "default_overlay_host")]
    pub overlay_host: String,

    /// Port the overlay frame server listens on.
    #[serde(default = "default_overlay_port")]
    pub overlay_port: u16,
}

impl InfrastructureConfig {
    /// Override endpoints with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("NATS_URL") {
            self.nats_url = val;
        }
        if let Ok(val) = std::env::var("SHOAL_CONFIG_API_URL") {
            self.config_api_url = val;
        }
    }
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            nats_url: default_nats_url(),
            config_api_url: default_config_api_url(),
            overlay_host: default_overlay_host(),
            overlay_port: default_overlay_port(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_true() -> bool {
    true
}

fn default_streamer_identity() -> String {
    "streamer".to_owned()
}

fn default_skin() -> String {
    "goldfish".to_owned()
}

const fn default_extent() -> f64 {
    100.0
}

const fn default_top_band() -> (f64, f64) {
    (8.0, 40.0)
}

const fn default_bottom_band() -> (f64, f64) {
    (58.0, 92.0)
}

const fn default_arrival_tolerance() -> f64 {
    3.0
}

const fn default_min_speed() -> f64 {
    0.15
}

const fn default_max_speed() -> f64 {
    0.45
}

fn default_centerpiece() -> String {
    "castle".to_owned()
}

const fn default_decoration_repeats() -> u32 {
    3
}

const fn default_tick_interval_ms() -> u64 {
    50
}

const fn default_roster_poll_ms() -> u64 {
    5_000
}

const fn default_roster_timeout_ms() -> u64 {
    3_000
}

const fn default_config_poll_ms() -> u64 {
    30_000
}

const fn default_arrival_ms() -> u64 {
    1_500
}

const fn default_departure_fade_ms() -> u64 {
    1_200
}

const fn default_death_animation_ms() -> u64 {
    800
}

const fn default_suppression_grace_ms() -> u64 {
    15_000
}

const fn default_speech_ms() -> u64 {
    6_000
}

const fn default_speech_max_chars() -> usize {
    80
}

const fn default_effect_ms() -> u64 {
    1_500
}

const fn default_predation_approach_ms() -> u64 {
    2_500
}

const fn default_predation_strike_ms() -> u64 {
    400
}

const fn default_predation_withdraw_ms() -> u64 {
    2_000
}

const fn default_offscreen_margin() -> f64 {
    15.0
}

const fn default_strike_gap() -> f64 {
    6.0
}

const fn default_pairing_gap() -> f64 {
    8.0
}

const fn default_pairing_display_ms() -> u64 {
    4_000
}

const fn default_approach_speed_factor() -> f64 {
    1.5
}

const fn default_race_start_x() -> f64 {
    8.0
}

const fn default_race_finish_x() -> f64 {
    92.0
}

const fn default_lane_gap() -> f64 {
    10.0
}

const fn default_race_ready_ms() -> u64 {
    1_500
}

const fn default_race_finished_ms() -> u64 {
    2_500
}

const fn default_race_max_running_ms() -> u64 {
    30_000
}

const fn default_race_base_speed() -> f64 {
    0.5
}

const fn default_race_min_speed() -> f64 {
    0.2
}

const fn default_race_max_speed() -> f64 {
    1.4
}

const fn default_race_floor_speed() -> f64 {
    0.4
}

const fn default_burst_chance() -> f64 {
    0.06
}

const fn default_burst_amount() -> f64 {
    0.35
}

const fn default_stumble_chance() -> f64 {
    0.02
}

const fn default_stumble_factor() -> f64 {
    0.4
}

const fn default_decay() -> f64 {
    0.985
}

const fn default_sync_poll_interval_ms() -> u64 {
    100
}

const fn default_sync_timeout_ms() -> u64 {
    15_000
}

const fn default_sync_tolerance() -> f64 {
    1.5
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_owned()
}

fn default_config_api_url() -> String {
    "http://localhost:8787".to_owned()
}

fn default_overlay_host() -> String {
    "127.0.0.1".to_owned()
}

const fn default_overlay_port() -> u16 {
    8090
}

fn default_log_level() -> String {
    "info".to_owned()
}
