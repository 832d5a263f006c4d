//! Publisher, Consumer and Agent: domain verbs over a [`Coordinator`].
//!
//! Each role builds an [`Invocation`] for its verb and hands it to its
//! coordinator; none of them retry or record anything themselves.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::coordinator::{Completion, Coordinator};
use crate::directory::Verb;
use crate::endpoint::Invocation;
use crate::errors::{AgencyError, Result};
use crate::types::Payload;

/// The two role kinds; also the key of a deadletter log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleKind {
    Publisher,
    Consumer,
}

impl RoleKind {
    /// Lowercase name (`"publisher"`, `"consumer"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Publisher => "publisher",
            Self::Consumer => "consumer",
        }
    }
}

impl std::fmt::Display for RoleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Publisher => f.write_str("Publisher"),
            Self::Consumer => f.write_str("Consumer"),
        }
    }
}

// ---------------------------------------------------------------------------

async fn run(coordinator: &Coordinator, verb: Verb, payload: Payload) -> Result<Completion> {
    let invocation = Invocation::new(Arc::clone(coordinator.endpoint()), verb, payload)?;
    Ok(coordinator.execute(Arc::new(invocation)).await)
}

fn describe(f: &mut std::fmt::Formatter<'_>, kind: RoleKind, coordinator: &Coordinator) -> std::fmt::Result {
    let contingency = if coordinator.has_contingency() { ":contingency" } else { "" };
    write!(f, "{kind}:{}{contingency}", coordinator.endpoint().transport())
}

/// Sends payloads through the endpoint's `send` operation.
#[derive(Debug, Clone)]
pub struct Publisher {
    coordinator: Coordinator,
    send: &'static str,
}

impl Publisher {
    /// Fails with [`AgencyError::CapabilityNotSupported`] if the endpoint
    /// cannot send.
    pub fn new(coordinator: Coordinator) -> Result<Self> {
        let send = coordinator.endpoint().operation(Verb::Send)?;
        Ok(Self { coordinator, send })
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Publishes `payload`.
    pub async fn publish(&self, payload: Payload) -> Completion {
        let invocation =
            Invocation::resolved(Arc::clone(self.coordinator.endpoint()), Verb::Send, self.send, payload);
        self.coordinator.execute(Arc::new(invocation)).await
    }

    /// Creates the destination, if the transport supports it.
    pub async fn create_target(&self, payload: Payload) -> Result<Completion> {
        run(&self.coordinator, Verb::CreateTarget, payload).await
    }
}

impl std::fmt::Display for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<")?;
        describe(f, RoleKind::Publisher, &self.coordinator)?;
        f.write_str(">")
    }
}

/// Retrieves payloads through the endpoint's `receive` operation.
#[derive(Debug, Clone)]
pub struct Consumer {
    coordinator: Coordinator,
    receive: &'static str,
}

impl Consumer {
    /// Fails with [`AgencyError::CapabilityNotSupported`] if the endpoint
    /// cannot receive.
    pub fn new(coordinator: Coordinator) -> Result<Self> {
        let receive = coordinator.endpoint().operation(Verb::Receive)?;
        Ok(Self { coordinator, receive })
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Consumes whatever `query` selects.
    pub async fn consume(&self, query: Payload) -> Completion {
        let invocation =
            Invocation::resolved(Arc::clone(self.coordinator.endpoint()), Verb::Receive, self.receive, query);
        self.coordinator.execute(Arc::new(invocation)).await
    }

    /// Creates the source, if the transport supports it.
    pub async fn create_target(&self, payload: Payload) -> Result<Completion> {
        run(&self.coordinator, Verb::CreateTarget, payload).await
    }
}

impl std::fmt::Display for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<")?;
        describe(f, RoleKind::Consumer, &self.coordinator)?;
        f.write_str(">")
    }
}

// ---------------------------------------------------------------------------

/// Either role, for callers that assemble agents from heterogeneous input.
#[derive(Debug, Clone)]
pub enum Role {
    Publisher(Publisher),
    Consumer(Consumer),
}

impl Role {
    pub fn kind(&self) -> RoleKind {
        match self {
            Self::Publisher(_) => RoleKind::Publisher,
            Self::Consumer(_) => RoleKind::Consumer,
        }
    }
}

impl From<Publisher> for Role {
    fn from(publisher: Publisher) -> Self {
        Self::Publisher(publisher)
    }
}

impl From<Consumer> for Role {
    fn from(consumer: Consumer) -> Self {
        Self::Consumer(consumer)
    }
}

/// A consumer and a publisher behind one handle.
#[derive(Debug, Clone)]
pub struct Agent {
    consumer: Consumer,
    publisher: Publisher,
}

impl Agent {
    pub fn new(consumer: Consumer, publisher: Publisher) -> Self {
        Self { consumer, publisher }
    }

    /// Assembles an agent from untyped roles.
    ///
    /// Fails with [`AgencyError::RoleTypeMismatch`] if either argument is the
    /// wrong kind; the consumer slot is checked first.
    pub fn from_roles(consumer: Role, publisher: Role) -> Result<Self> {
        let consumer = match consumer {
            Role::Consumer(c) => c,
            other => {
                return Err(AgencyError::RoleTypeMismatch {
                    slot: "consumer",
                    expected: RoleKind::Consumer,
                    received: other.kind(),
                })
            }
        };
        let publisher = match publisher {
            Role::Publisher(p) => p,
            other => {
                return Err(AgencyError::RoleTypeMismatch {
                    slot: "publisher",
                    expected: RoleKind::Publisher,
                    received: other.kind(),
                })
            }
        };
        Ok(Self::new(consumer, publisher))
    }

    pub fn consumer(&self) -> &Consumer {
        &self.consumer
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// See [`Publisher::publish`].
    pub async fn publish(&self, payload: Payload) -> Completion {
        self.publisher.publish(payload).await
    }

    /// See [`Consumer::consume`].
    pub async fn consume(&self, query: Payload) -> Completion {
        self.consumer.consume(query).await
    }
}

impl std::fmt::Display for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<Agent|")?;
        describe(f, RoleKind::Consumer, &self.consumer.coordinator)?;
        f.write_str("|")?;
        describe(f, RoleKind::Publisher, &self.publisher.coordinator)?;
        f.write_str(">")
    }
}
