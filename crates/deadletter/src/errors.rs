//! Errors raised by the deadletter store.

use std::path::PathBuf;

use agency::RoleKind;
use thiserror::Error;

/// Result type alias for deadletter operations.
pub type Result<T> = std::result::Result<T, DeadletterError>;

#[derive(Debug, Error)]
pub enum DeadletterError {
    /// The role's log is absent or holds no records.
    #[error("no deadletters recorded for {role}")]
    Empty { role: RoleKind },

    #[error("deadletter I/O failed at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The head of the log was not a well-formed record. It has been removed
    /// from the log; `record` holds its raw text.
    #[error("malformed deadletter record in {}: {message}", path.display())]
    MalformedRecord { path: PathBuf, message: String, record: String },

    #[error("home directory could not be determined")]
    HomeDirectoryUnavailable,
}

impl DeadletterError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub(crate) fn malformed(path: impl Into<PathBuf>, message: impl Into<String>, record: &str) -> Self {
        Self::MalformedRecord { path: path.into(), message: message.into(), record: record.to_string() }
    }

    /// Returns `true` for [`DeadletterError::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty { .. })
    }
}
