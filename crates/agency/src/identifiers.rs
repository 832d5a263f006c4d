//! Newtype identifiers.
//!
//! Values with an identity of their own are wrapped so they cannot be swapped
//! for an arbitrary string or UUID by accident.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// UUID-backed identifiers
// ---------------------------------------------------------------------------

/// Identifies one coordinated execution (one [`crate::Effort`]).
///
/// Generated fresh for every call to [`crate::Coordinator::execute`] made under
/// a contingency; attached to log events and deadletter records so every attempt
/// of a single execution can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EffortId(Uuid);

impl EffortId {
    /// Generates a new random identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for EffortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// String-backed identifiers
// ---------------------------------------------------------------------------

string_id! {
    /// Names a credentials-file profile section (e.g. `"default"`, `"testing"`).
    ///
    /// Rendered as the `[profile]` header by [`crate::Configuration::as_file`].
    ProfileName
}

impl Default for ProfileName {
    fn default() -> Self {
        Self("default".to_string())
    }
}
