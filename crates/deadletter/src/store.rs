//! The role-keyed deadletter log.
//!
//! Each role has one file under the store root, named after the role
//! (`publisher`, `consumer`). Records are appended as
//!
//! ```text
//! -> [2024-01-01 12:00:00.000000] -- <body>
//! ```
//!
//! oldest first. A body may span lines; a record ends where the next
//! `\n-> [` marker begins. Body lines that would read as a marker are
//! stored with one extra leading `\` and restored when taken.
//!
//! The store takes no locks. Callers sharing a root across processes must
//! serialize appends and takes themselves.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use agency::{Call, Failure, FailureContext, RecordFailureProvider, RoleKind, SharedAction, Timestamp};
use chrono::NaiveDateTime;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::errors::{DeadletterError, Result};

/// Directory under the home directory used by [`DeadletterStore::at_default_location`].
pub const DEFAULT_RELATIVE_ROOT: &str = ".recruitment/agency/deadletters";

const MARKER: &str = "-> [";
const SEPARATOR: &str = "] -- ";
const BOUNDARY: &str = "\n-> [";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// One consumed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    pub recorded_at: Timestamp,
    pub body: String,
}

/// Append/take-oldest logs, one per role, under a single root directory.
#[derive(Debug, Clone)]
pub struct DeadletterStore {
    root: PathBuf,
}

impl DeadletterStore {
    /// Creates a store rooted at `root`. Nothing is touched until the first append.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates a store at `~/.recruitment/agency/deadletters`.
    pub fn at_default_location() -> Result<Self> {
        let home = dirs::home_dir().ok_or(DeadletterError::HomeDirectoryUnavailable)?;
        Ok(Self::new(home.join(DEFAULT_RELATIVE_ROOT)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the log holding `role`'s records.
    pub fn path_for(&self, role: RoleKind) -> PathBuf {
        self.root.join(role.as_str())
    }

    /// Appends `record` to `role`'s log, stamped with the current UTC time.
    ///
    /// One trailing newline on `record` is dropped; every stored record ends
    /// with exactly one.
    pub async fn append(&self, role: RoleKind, record: &str) -> Result<()> {
        let path = self.path_for(role);
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| DeadletterError::io(&self.root, e))?;

        let body = escape_body(record.strip_suffix('\n').unwrap_or(record));
        let stamp = Timestamp::now().as_datetime().format(TIMESTAMP_FORMAT);
        let line = format!("{MARKER}{stamp}{SEPARATOR}{body}\n");

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| DeadletterError::io(&path, e))?;
        file.write_all(line.as_bytes()).await.map_err(|e| DeadletterError::io(&path, e))?;
        file.flush().await.map_err(|e| DeadletterError::io(&path, e))?;

        info!(role = role.as_str(), path = %path.display(), bytes = line.len(), "deadletter appended");
        Ok(())
    }

    /// Removes and returns the oldest record in `role`'s log.
    ///
    /// An absent or empty log fails with [`DeadletterError::Empty`]. A head
    /// record that cannot be parsed is still removed and comes back, raw, in
    /// [`DeadletterError::MalformedRecord`]; the next call moves on to the
    /// record behind it.
    pub async fn take_oldest(&self, role: RoleKind) -> Result<DeadLetter> {
        let path = self.path_for(role);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(DeadletterError::Empty { role }),
            Err(e) => return Err(DeadletterError::io(&path, e)),
        };
        if contents.trim().is_empty() {
            return Err(DeadletterError::Empty { role });
        }

        let (head, rest) = match contents.find(BOUNDARY) {
            Some(at) => (&contents[..at], &contents[at + 1..]),
            None => (contents.strip_suffix('\n').unwrap_or(&contents), ""),
        };
        let parsed = parse_record(&path, head);

        // Temp file plus rename, so a crash never leaves a half-written log.
        let temp = path.with_extension("tmp");
        tokio::fs::write(&temp, rest).await.map_err(|e| DeadletterError::io(&temp, e))?;
        tokio::fs::rename(&temp, &path).await.map_err(|e| DeadletterError::io(&path, e))?;

        match &parsed {
            Ok(letter) => {
                debug!(role = role.as_str(), recorded_at = %letter.recorded_at, remaining = rest.len(), "deadletter taken")
            }
            Err(e) => warn!(role = role.as_str(), error = %e, remaining = rest.len(), "malformed deadletter discarded"),
        }
        parsed
    }

    /// A failure-recording provider that appends each failure record to
    /// `role`'s log.
    ///
    /// An append error becomes the recorder's [`Failure::Action`] outcome; the
    /// coordinator logs it and the effort is unaffected.
    pub fn record_failure_provider(self: &Arc<Self>, role: RoleKind) -> RecordFailureProvider {
        let store = Arc::clone(self);
        Arc::new(move |context: &FailureContext<'_>| {
            let store = Arc::clone(&store);
            let record = context.record();
            Arc::new(Call::new(format!("deadletter:{}", role.as_str()), move || {
                let store = Arc::clone(&store);
                let record = record.clone();
                async move {
                    store.append(role, &record).await.map(|()| Value::Null).map_err(|e| {
                        warn!(role = role.as_str(), error = %e, "could not write deadletter");
                        Failure::action(e.to_string())
                    })
                }
            })) as SharedAction
        })
    }
}

fn parse_record(path: &Path, head: &str) -> Result<DeadLetter> {
    let stamped = head
        .strip_prefix(MARKER)
        .ok_or_else(|| DeadletterError::malformed(path, "record does not start with '-> ['", head))?;
    let (stamp, body) = stamped
        .split_once(SEPARATOR)
        .ok_or_else(|| DeadletterError::malformed(path, "record has no '] -- ' separator", head))?;
    let recorded_at = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
        .map_err(|e| DeadletterError::malformed(path, format!("bad timestamp '{stamp}': {e}"), head))?
        .and_utc();

    Ok(DeadLetter { recorded_at: Timestamp::from_utc(recorded_at), body: unescape_body(body) })
}

/// True for lines made of zero or more `\` followed by the record marker.
fn is_marker_like(line: &str) -> bool {
    line.trim_start_matches('\\').starts_with(MARKER)
}

fn escape_body(body: &str) -> String {
    body.split('\n')
        .map(|line| if is_marker_like(line) { format!("\\{line}") } else { line.to_string() })
        .collect::<Vec<_>>()
        .join("\n")
}

fn unescape_body(body: &str) -> String {
    body.split('\n')
        .map(|line| match line.strip_prefix('\\') {
            Some(rest) if is_marker_like(rest) => rest,
            _ => line,
        })
        .collect::<Vec<_>>()
        .join("\n")
}
