//! Capability directory.
//!
//! Maps each [`Transport`] to the subset of canonical [`Verb`]s it exposes and
//! the concrete operation name backing each one. The directory is a static
//! table; lookups are pure and deterministic.
//!
//! | Transport | create_target | send | receive |
//! |-----------|---------------|------|---------|
//! | `logs` | | | `get_log_events` |
//! | `s3` | `create_bucket` | `upload_fileobj` | `get_object` |
//! | `sns` | `create_topic` | `publish` | |
//! | `sqs` | `create_queue` | `send_message` | `receive_message` |
//! | `kinesis` | `create_stream` | `put_record` | |

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{AgencyError, Result};

// ---------------------------------------------------------------------------
// Transports and verbs
// ---------------------------------------------------------------------------

/// One concrete messaging or storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Log retrieval.
    Logs,
    /// Object storage.
    S3,
    /// Notification topics.
    Sns,
    /// Queues.
    Sqs,
    /// Streams.
    Kinesis,
}

impl Transport {
    /// Every transport, in directory order.
    pub const ALL: [Transport; 5] =
        [Transport::Logs, Transport::S3, Transport::Sns, Transport::Sqs, Transport::Kinesis];

    /// Returns the short identifier (`"logs"`, `"s3"`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Logs => "logs",
            Self::S3 => "s3",
            Self::Sns => "sns",
            Self::Sqs => "sqs",
            Self::Kinesis => "kinesis",
        }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transport {
    type Err = AgencyError;

    fn from_str(s: &str) -> Result<Self> {
        Transport::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| AgencyError::unsupported_transport(s))
    }
}

// ---------------------------------------------------------------------------

/// One of the three canonical operations a transport may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    /// Create the destination (bucket, topic, queue, stream).
    CreateTarget,
    /// Deliver a payload.
    Send,
    /// Retrieve a payload.
    Receive,
}

impl Verb {
    /// Every verb.
    pub const ALL: [Verb; 3] = [Verb::CreateTarget, Verb::Send, Verb::Receive];

    /// Returns the canonical name (`"create_target"`, `"send"`, `"receive"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateTarget => "create_target",
            Self::Send => "send",
            Self::Receive => "receive",
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// The table
// ---------------------------------------------------------------------------

const LOGS: &[(Verb, &str)] = &[(Verb::Receive, "get_log_events")];
const S3: &[(Verb, &str)] = &[
    (Verb::CreateTarget, "create_bucket"),
    (Verb::Send, "upload_fileobj"),
    (Verb::Receive, "get_object"),
];
const SNS: &[(Verb, &str)] = &[(Verb::CreateTarget, "create_topic"), (Verb::Send, "publish")];
const SQS: &[(Verb, &str)] = &[
    (Verb::CreateTarget, "create_queue"),
    (Verb::Send, "send_message"),
    (Verb::Receive, "receive_message"),
];
const KINESIS: &[(Verb, &str)] =
    &[(Verb::CreateTarget, "create_stream"), (Verb::Send, "put_record")];

/// The verbs a transport exposes and the operation backing each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interface {
    transport: Transport,
    bindings: &'static [(Verb, &'static str)],
}

impl Interface {
    /// Transport this interface describes.
    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// Returns the operation backing `verb`, if the transport offers it.
    pub fn get(&self, verb: Verb) -> Option<&'static str> {
        self.bindings.iter().find(|(v, _)| *v == verb).map(|(_, op)| *op)
    }

    /// Returns `true` if the transport offers `verb`.
    pub fn supports(&self, verb: Verb) -> bool {
        self.get(verb).is_some()
    }

    /// Iterates the offered verbs in canonical order.
    pub fn verbs(&self) -> impl Iterator<Item = Verb> + '_ {
        Verb::ALL.into_iter().filter(|v| self.supports(*v))
    }

    /// Iterates `(verb, operation)` pairs in canonical verb order.
    pub fn iter(&self) -> impl Iterator<Item = (Verb, &'static str)> + '_ {
        Verb::ALL.into_iter().filter_map(|v| self.get(v).map(|op| (v, op)))
    }
}

/// Returns the interface of `transport`.
pub fn interface_of(transport: Transport) -> Interface {
    let bindings = match transport {
        Transport::Logs => LOGS,
        Transport::S3 => S3,
        Transport::Sns => SNS,
        Transport::Sqs => SQS,
        Transport::Kinesis => KINESIS,
    };
    Interface { transport, bindings }
}

/// Returns the operation backing `verb` on `transport`.
///
/// Fails with [`AgencyError::CapabilityNotSupported`] if the transport does
/// not offer the verb.
pub fn lookup(transport: Transport, verb: Verb) -> Result<&'static str> {
    interface_of(transport)
        .get(verb)
        .ok_or_else(|| AgencyError::capability_not_supported(transport, verb))
}

/// Like [`lookup`], starting from a transport name.
///
/// An unknown name fails with [`AgencyError::UnsupportedTransport`], distinct
/// from the [`AgencyError::CapabilityNotSupported`] raised for a known
/// transport lacking the verb.
pub fn lookup_by_name(transport: &str, verb: Verb) -> Result<&'static str> {
    lookup(transport.parse()?, verb)
}
