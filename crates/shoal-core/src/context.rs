//! Owned overlay context.
//!
//! Everything the simulation needs to know about the outside world lives
//! here and is passed explicitly: the version-guarded broadcaster config
//! cache, the controller link state, the locally hidden identities, and the
//! session skin cache.

use std::collections::BTreeSet;

use shoal_types::{ConnectionState, FeatureToggles, OverlayConfig, ViewerKey};
use tracing::{debug, info};

use crate::config::StreamerConfig;
use crate::skins::SkinBook;

/// How a config payload reached the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigChannel {
    /// Fallback poll of the versioned endpoint.
    Poll,
    /// Unsolicited push after a broadcaster save.
    Push,
}

impl core::fmt::Display for ConfigChannel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Poll => f.write_str("poll"),
            Self::Push => f.write_str("push"),
        }
    }
}

/// Result of offering a config payload to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The payload replaced the cached config.
    Applied {
        /// Version that was replaced, if any config had been applied.
        previous: Option<u64>,
        /// Version now in effect.
        version: u64,
    },
    /// The payload was not newer than the cached config and was discarded.
    Stale {
        /// Version in effect.
        current: u64,
        /// Version that was offered.
        offered: u64,
    },
}

impl ApplyOutcome {
    /// Whether the payload took effect.
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Read-only cache of the broadcaster's config, guarded by version.
///
/// Poll and push race freely; the cache only ever moves to a strictly
/// higher version, so the applied version is always the maximum observed.
#[derive(Debug, Clone, Default)]
pub struct ConfigCache {
    current: Option<OverlayConfig>,
    fallback: OverlayConfig,
}

impl ConfigCache {
    /// Create an empty cache. Until a payload arrives, defaults apply.
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a payload. Only a strictly higher version is applied.
    pub fn apply(&mut self, config: OverlayConfig, channel: ConfigChannel) -> ApplyOutcome {
        let offered = config.version;
        match self.current.as_ref().map(|c| c.version) {
            Some(current) if offered <= current => {
                debug!(%channel, current, offered, "discarding stale overlay config");
                ApplyOutcome::Stale { current, offered }
            }
            previous => {
                info!(%channel, version = offered, ?previous, "applied overlay config");
                self.current = Some(config);
                ApplyOutcome::Applied {
                    previous,
                    version: offered,
                }
            }
        }
    }

    /// The config in effect (defaults before the first payload).
    pub fn config(&self) -> &OverlayConfig {
        self.current.as_ref().unwrap_or(&self.fallback)
    }

    /// Version in effect, if any payload has been applied.
    pub fn version(&self) -> Option<u64> {
        self.current.as_ref().map(|c| c.version)
    }

    /// Feature toggles in effect.
    pub fn toggles(&self) -> FeatureToggles {
        self.config().feature_toggles
    }
}

/// Explicitly owned state shared by the registry and the choreographer.
#[derive(Debug, Clone)]
pub struct OverlayContext {
    streamer: ViewerKey,
    hidden: BTreeSet<ViewerKey>,
    /// Broadcaster config cache.
    pub config: ConfigCache,
    /// Session skin cache and resolver.
    pub skins: SkinBook,
    connection: ConnectionState,
}

impl OverlayContext {
    /// Build a context for the configured channel.
    pub fn new(streamer: &StreamerConfig) -> Self {
        let key = streamer.key();
        let mut hidden: BTreeSet<ViewerKey> = streamer
            .hidden_identities
            .iter()
            .map(ViewerKey::new)
            .collect();
        if streamer.hide_self {
            hidden.insert(key.clone());
        }
        Self {
            streamer: key,
            hidden,
            config: ConfigCache::new(),
            skins: SkinBook::new(streamer.default_skin_id()),
            connection: ConnectionState::Disconnected,
        }
    }

    /// The channel this overlay serves.
    pub const fn streamer(&self) -> &ViewerKey {
        &self.streamer
    }

    /// Whether an identity is kept out of the scene by local settings or
    /// by the broadcaster's exclusion list.
    pub fn is_filtered(&self, identity: &ViewerKey) -> bool {
        self.hidden.contains(identity) || self.config.config().excludes(identity)
    }

    /// Controller link state.
    pub const fn connection(&self) -> ConnectionState {
        self.connection
    }

    /// Record the controller link state. Returns `true` when it changed.
    pub fn set_connection(&mut self, state: ConnectionState) -> bool {
        let changed = self.connection != state;
        self.connection = state;
        changed
    }
}
