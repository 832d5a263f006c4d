//! Shared value types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque key/value structure passed to and returned from transport operations.
///
/// Its shape is transport-specific (e.g. `{"Message": "..."}` for a topic,
/// `{"logGroupName": "...", "logStreamName": "..."}` for a log source); this
/// crate never inspects it.
pub type Payload = serde_json::Value;

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
