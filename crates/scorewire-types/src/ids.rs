//! Type-safe identifier wrappers.
//!
//! Internal identifiers use UUID v7 (time-ordered) for efficient database
//! indexing. The upstream source assigns its own `external_key` per match;
//! that key is a plain string and lives on [`crate::Match`] directly, since
//! it is owned by the source, not by us.

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

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique internal identifier for a tracked match.
    MatchId
}

define_id! {
    /// Unique identifier for one live client connection on the gateway.
    ConnectionId
}

/// Opaque reference to a participant (team) as named by the upstream source.
///
/// The inner string is a slug validated at the ingestion boundary: lowercase
/// alphanumerics plus `-` and `_`, so it can be embedded in a topic key
/// without further escaping.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export, export_to = "bindings/")]
pub struct TeamRef(String);

impl TeamRef {
    /// Wrap an already-validated team slug.
    pub const fn new(slug: String) -> Self {
        Self(slug)
    }

    /// Return the slug as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for TeamRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TeamRef {
    fn from(slug: &str) -> Self {
        Self(slug.to_owned())
    }
}
