//! Error types for the agency domain.
//!
//! Errors fall in two families that never mix:
//!
//! - **Construction-time** ([`AgencyError`], [`ClientBuildError`]): raised
//!   before any action is attempted, when a [`crate::Configuration`],
//!   [`crate::Endpoint`], role or [`crate::Agent`] cannot be built. These
//!   propagate with `?`.
//! - **Execution-time** ([`TransportError`], [`Failure`]): carried as the
//!   error side of an [`crate::Outcome`] and aggregated into an
//!   [`crate::Effort`]. [`crate::Coordinator::execute`] never returns them as
//!   a Rust `Err`; they are values describing what happened.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::directory::{Transport, Verb};
use crate::roles::RoleKind;
use crate::Configuration;

/// Result type alias for construction-time operations.
pub type Result<T> = std::result::Result<T, AgencyError>;

// ---------------------------------------------------------------------------
// Construction-time errors
// ---------------------------------------------------------------------------

/// Errors raised while assembling configurations, endpoints and roles.
#[derive(Debug, Error)]
pub enum AgencyError {
    /// The transport identifier is not in the capability directory.
    #[error("unsupported transport '{name}'")]
    UnsupportedTransport {
        /// The identifier that failed to resolve.
        name: String,
    },

    /// The transport exists but does not offer the requested verb.
    #[error("transport '{transport}' does not support '{verb}'")]
    CapabilityNotSupported {
        /// Transport that was queried.
        transport: Transport,
        /// Verb that it lacks.
        verb: Verb,
    },

    /// A required configuration field is missing or has the wrong type.
    #[error("invalid configuration: {message}")]
    ConfigInvalid {
        /// Description naming the offending field or type.
        message: String,
    },

    /// The requested feature is reserved but not implemented.
    #[error("not implemented: {feature}")]
    NotImplemented {
        /// Name of the reserved feature.
        feature: String,
    },

    /// The transport client could not be constructed.
    ///
    /// The configuration carried here is always the redacted form; the string
    /// rendering of this error never contains a credential.
    #[error("failed to instantiate endpoint for configuration:\n{given}")]
    EndpointInstantiationFailed {
        /// Redacted copy of the configuration that was used.
        given: Box<Configuration>,
        /// Why the client factory refused the configuration.
        #[source]
        source: ClientBuildError,
    },

    /// An [`crate::Agent`] was assembled from roles of the wrong kind.
    #[error("Agent {slot} must be of type {expected} not {received}")]
    RoleTypeMismatch {
        /// Which constructor argument was wrong (`"consumer"` or `"publisher"`).
        slot: &'static str,
        /// Role the slot requires.
        expected: RoleKind,
        /// Role that was supplied.
        received: RoleKind,
    },
}

impl AgencyError {
    /// Creates an unsupported-transport error.
    pub fn unsupported_transport(name: impl Into<String>) -> Self {
        Self::UnsupportedTransport { name: name.into() }
    }

    /// Creates a capability error for `transport` lacking `verb`.
    pub fn capability_not_supported(transport: Transport, verb: Verb) -> Self {
        Self::CapabilityNotSupported { transport, verb }
    }

    /// Creates a configuration error.
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::ConfigInvalid { message: message.into() }
    }

    /// Creates a not-implemented error.
    pub fn not_implemented(feature: impl Into<String>) -> Self {
        Self::NotImplemented { feature: feature.into() }
    }

    /// Creates an instantiation error, redacting `given` before storing it.
    pub fn endpoint_instantiation_failed(given: &Configuration, source: ClientBuildError) -> Self {
        Self::EndpointInstantiationFailed { given: Box::new(given.redact()), source }
    }
}

// ---------------------------------------------------------------------------

/// Why a [`crate::ClientFactory`] could not produce a transport client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientBuildError {
    /// No region was configured and the transport needs one.
    #[error("no region specified")]
    NoRegion,

    /// The configured region is not a syntactically valid region name.
    #[error("invalid region name")]
    InvalidRegion,

    /// Only one half of an access-key/secret pair was configured.
    #[error("partial credentials: access key id and secret access key must be set together")]
    PartialCredentials,

    /// Any other construction failure reported by the underlying SDK.
    #[error("client construction failed: {message}")]
    Other {
        /// SDK-provided description.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Execution-time errors
// ---------------------------------------------------------------------------

/// A failed transport call.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum TransportError {
    /// The remote service answered with an error code.
    #[error("{operation} failed with {code}: {message}")]
    Service {
        /// Concrete operation that was invoked (e.g. `"publish"`).
        operation: String,
        /// Service error code (e.g. `"500"`, `"ThrottlingException"`).
        code: String,
        /// Service-provided message.
        message: String,
    },

    /// The service could not be reached.
    #[error("{operation} could not connect: {message}")]
    Connection {
        /// Concrete operation that was invoked.
        operation: String,
        /// Description of the connectivity failure.
        message: String,
    },
}

impl TransportError {
    /// Creates a service error.
    pub fn service(
        operation: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Service { operation: operation.into(), code: code.into(), message: message.into() }
    }

    /// Creates a connection error.
    pub fn connection(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection { operation: operation.into(), message: message.into() }
    }

    /// Returns the operation this error was raised by.
    pub fn operation(&self) -> &str {
        match self {
            Self::Service { operation, .. } | Self::Connection { operation, .. } => operation,
        }
    }

    /// Returns `true` for service errors whose code is a 5xx status.
    pub fn is_server_error(&self) -> bool {
        match self {
            Self::Service { code, .. } => code.starts_with('5') && code.len() == 3,
            Self::Connection { .. } => false,
        }
    }
}

// ---------------------------------------------------------------------------

/// The error side of an [`crate::Outcome`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum Failure {
    /// A transport call failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Every permitted attempt failed.
    #[error("retries exhausted after {attempts} attempts; last error: {last_error}")]
    RetryExhausted {
        /// Total attempts made (initial attempt included).
        attempts: u32,
        /// Rendering of the final attempt's failure.
        last_error: String,
    },

    /// A non-transport action (callback, failure recorder) failed.
    #[error("action failed: {message}")]
    Action {
        /// Description of the failure.
        message: String,
    },
}

impl Failure {
    /// Creates an action failure.
    pub fn action(message: impl Into<String>) -> Self {
        Self::Action { message: message.into() }
    }

    /// Returns `true` if this is the culmination of an exhausted retry policy.
    pub fn is_retry_exhausted(&self) -> bool {
        matches!(self, Self::RetryExhausted { .. })
    }

    /// Returns the wrapped transport error, if any.
    pub fn as_transport(&self) -> Option<&TransportError> {
        match self {
            Self::Transport(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_identified_by_code() {
        assert!(TransportError::service("publish", "500", "boom").is_server_error());
        assert!(TransportError::service("publish", "503", "busy").is_server_error());
        assert!(!TransportError::service("publish", "404", "missing").is_server_error());
        assert!(!TransportError::service("publish", "5xx-ish", "odd").is_server_error());
        assert!(!TransportError::connection("publish", "refused").is_server_error());
    }

    #[test]
    fn failure_wraps_transport_errors() {
        let failure = Failure::from(TransportError::service("send_message", "500", "boom"));
        assert_eq!(failure.as_transport().map(TransportError::operation), Some("send_message"));
        assert!(!failure.is_retry_exhausted());
        assert_eq!(failure.to_string(), "send_message failed with 500: boom");
    }

    #[test]
    fn role_mismatch_names_expected_and_received() {
        let error = AgencyError::RoleTypeMismatch {
            slot: "consumer",
            expected: RoleKind::Consumer,
            received: RoleKind::Publisher,
        };
        assert_eq!(error.to_string(), "Agent consumer must be of type Consumer not Publisher");
    }
}
