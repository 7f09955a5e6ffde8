//! Type-safe identifier wrappers.
//!
//! Events are identified by UUID v7 (time-ordered) so log lines sort in
//! start order. Audience identities, skins, and decorations arrive from
//! external services as strings; they are wrapped in normalized string
//! keys so a viewer named `Nemo` and `nemo ` map to the same entity.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

/// Generates a normalized (trimmed, lowercase) string key.
macro_rules! define_key {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(String);

        impl $name {
            /// Create a key, trimming whitespace and lowercasing.
            pub fn new(raw: impl AsRef<str>) -> Self {
                Self(raw.as_ref().trim().to_lowercase())
            }

            /// Return the key as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Return a copy with normalization re-applied.
            ///
            /// Keys decoded straight from the wire skip [`Self::new`].
            pub fn normalized(&self) -> Self {
                Self::new(&self.0)
            }

            /// Whether the key is empty after normalization.
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self::new(raw)
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self::new(raw)
            }
        }
    };
}

define_id! {
    /// Unique identifier for a choreographed event (predation, pairing, race).
    EventId
}

define_key! {
    /// Stable identity of an audience member (and of the streamer channel).
    ViewerKey
}

define_key! {
    /// Identifier of a creature skin asset.
    SkinId
}

define_key! {
    /// Identifier of a scene decoration asset.
    DecorationId
}
