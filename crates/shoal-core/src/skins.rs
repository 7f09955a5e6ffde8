//! Skin resolution and the per-session lookup cache.
//!
//! Preferred skins are fetched from the skin directory in one batched
//! lookup per roster cycle for identities not seen before this session.
//! Whether a preferred skin is actually granted is decided at reconcile
//! time against the current skin-by-role permissions, so a permission
//! change applies without another lookup.

use std::collections::{BTreeMap, BTreeSet};

use shoal_types::{OverlayConfig, RosterEntry, SkinId, ViewerKey};

/// Session cache of preferred skins plus the fallback skin.
#[derive(Debug, Clone)]
pub struct SkinBook {
    default_skin: SkinId,
    preferred: BTreeMap<ViewerKey, SkinId>,
}

impl SkinBook {
    /// Create an empty cache with the given fallback skin.
    pub const fn new(default_skin: SkinId) -> Self {
        Self {
            default_skin,
            preferred: BTreeMap::new(),
        }
    }

    /// Merge a lookup result into the cache.
    pub fn record(&mut self, lookups: BTreeMap<ViewerKey, SkinId>) {
        for (identity, skin) in lookups {
            if skin.is_blank() {
                continue;
            }
            self.preferred.insert(identity.normalized(), skin.normalized());
        }
    }

    /// Number of identities with a cached preference.
    pub fn len(&self) -> usize {
        self.preferred.len()
    }

    /// Whether no preference has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.preferred.is_empty()
    }

    /// Skin to draw for a roster entry under the given permissions.
    pub fn resolve(&self, entry: &RosterEntry, config: &OverlayConfig) -> SkinId {
        let identity = entry.identity.normalized();
        match self.preferred.get(&identity) {
            Some(skin) if is_permitted(skin, entry, config) => skin.clone(),
            _ => self.default_skin.clone(),
        }
    }
}

/// Whether any of the entry's roles may wear the skin.
///
/// A skin with no entry, or an empty role list, is unrestricted.
pub fn is_permitted(skin: &SkinId, entry: &RosterEntry, config: &OverlayConfig) -> bool {
    let allowed = config
        .skin_role_permissions
        .iter()
        .find(|(id, _)| id.normalized() == *skin)
        .map(|(_, roles)| roles);
    match allowed {
        None => true,
        Some(roles) if roles.is_empty() => true,
        Some(roles) => {
            let held = entry.roles();
            roles.iter().any(|role| held.contains(role))
        }
    }
}

/// Tracks which identities have already been looked up this session.
///
/// Owned by the roster poller so the lookup stays batched per cycle.
#[derive(Debug, Clone, Default)]
pub struct LookupLedger {
    resolved: BTreeSet<ViewerKey>,
}

impl LookupLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Identities in the roster never looked up before, deduplicated.
    pub fn pending(&self, roster: &[RosterEntry]) -> Vec<ViewerKey> {
        let unseen: BTreeSet<ViewerKey> = roster
            .iter()
            .map(|entry| entry.identity.normalized())
            .filter(|identity| !identity.is_blank() && !self.resolved.contains(identity))
            .collect();
        unseen.into_iter().collect()
    }

    /// Mark a batch as looked up. Called only after a successful lookup,
    /// so failed batches are retried next cycle.
    pub fn mark_resolved(&mut self, batch: &[ViewerKey]) {
        self.resolved.extend(batch.iter().cloned());
    }
}
