//! Local, role-keyed deadletter log.
//!
//! Payloads whose efforts exhausted every retry can be persisted here by
//! plugging [`DeadletterStore::record_failure_provider`] into an
//! [`agency::ContingencyConfig`]. Records are taken back one at a time,
//! oldest first, with [`DeadletterStore::take_oldest`].
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All filesystem I/O for the agency lives here; the
//! [`agency`] crate sees only the [`agency::RecordFailureProvider`] this
//! crate hands it.

pub mod errors;
pub mod store;

pub use errors::{DeadletterError, Result};
pub use store::{DeadLetter, DeadletterStore, DEFAULT_RELATIVE_ROOT};
