//! Messaging agency: publishers, consumers and agents over cloud transports.
//!
//! A [`Configuration`] names a transport and its connection settings. An
//! [`Endpoint`] binds that transport's verbs using the capability directory.
//! A [`Coordinator`] runs each invocation once, or under a contingency that
//! retries it and records the failure when every attempt fails.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** Transport clients are supplied
//! through [`ClientFactory`]; failure records are written by whatever action
//! a [`RecordFailureProvider`] returns. This crate performs no filesystem I/O.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`directory`] | Transports, verbs and the static capability table |
//! | [`config`] | `Configuration`, environment supplementation, redaction |
//! | [`endpoint`] | Client ports, `Endpoint`, `Invocation` |
//! | [`action`] | The `Action` trait and the `Call` closure adapter |
//! | [`effort`] | Attempt history of one coordinated action |
//! | [`contingency`] | Retry policies and failure recording |
//! | [`coordinator`] | `Coordinator::execute` and `Completion` |
//! | [`roles`] | `Publisher`, `Consumer`, `Agent` |
//! | [`stub`] | Scripted transport client for tests |
//! | [`identifiers`] | `EffortId`, `ProfileName` |
//! | [`types`] | `Payload`, `Timestamp` |
//! | [`errors`] | Every error type in the crate |

pub mod action;
pub mod config;
pub mod contingency;
pub mod coordinator;
pub mod directory;
pub mod effort;
pub mod endpoint;
pub mod errors;
pub mod identifiers;
pub mod roles;
pub mod stub;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use action::{Action, Call, Outcome, SharedAction};
pub use config::{Configuration, Source};
pub use contingency::{
    default_policy, log_failure_provider, ContingencyConfig, ContingencyPolicy, FailureContext,
    Reaction, RecordFailureProvider, RecordedRetryPolicy, RetryPolicy, RetryPolicyProvider,
    DEFAULT_MAX_RETRIES,
};
pub use coordinator::{Completion, Coordinator};
pub use directory::{interface_of, lookup, lookup_by_name, Interface, Transport, Verb};
pub use effort::Effort;
pub use endpoint::{ClientFactory, Endpoint, Invocation, TransportClient, ValidatingFactory};
pub use errors::{AgencyError, ClientBuildError, Failure, Result, TransportError};
pub use identifiers::{EffortId, ProfileName};
pub use roles::{Agent, Consumer, Publisher, Role, RoleKind};
pub use types::{Payload, Timestamp};
