//! Verb-bound handles to one transport.
//!
//! An [`Endpoint`] owns one transport client and the operation name behind
//! each verb the capability directory grants its transport. Clients come from
//! a [`ClientFactory`]; this crate never talks to a cloud SDK directly.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::action::{Action, Outcome};
use crate::config::Configuration;
use crate::directory::{interface_of, Transport, Verb};
use crate::errors::{AgencyError, ClientBuildError, Result, TransportError};
use crate::types::Payload;

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// A constructed client for one transport.
#[async_trait]
pub trait TransportClient: Send + Sync {
    /// Invokes the concrete `operation` (e.g. `"send_message"`) with `payload`.
    async fn invoke(&self, operation: &str, payload: Payload) -> std::result::Result<Payload, TransportError>;
}

/// Constructs transport clients from a [`Configuration`].
pub trait ClientFactory: Send + Sync {
    /// Builds a client, or explains why the configuration was refused.
    fn build(&self, config: &Configuration) -> std::result::Result<Arc<dyn TransportClient>, ClientBuildError>;
}

// ---------------------------------------------------------------------------

/// Wraps a factory with region and credential validation.
///
/// - A missing region fails with [`ClientBuildError::NoRegion`].
/// - A region that is not 1–63 ASCII alphanumerics or `-`, beginning and
///   ending with an alphanumeric, fails with [`ClientBuildError::InvalidRegion`].
/// - An access key id without a secret (or the reverse) fails with
///   [`ClientBuildError::PartialCredentials`].
pub struct ValidatingFactory<F> {
    inner: F,
}

impl<F: ClientFactory> ValidatingFactory<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }
}

impl<F: ClientFactory> ClientFactory for ValidatingFactory<F> {
    fn build(&self, config: &Configuration) -> std::result::Result<Arc<dyn TransportClient>, ClientBuildError> {
        let region = config.region_name().ok_or(ClientBuildError::NoRegion)?;
        if !is_valid_region(region) {
            return Err(ClientBuildError::InvalidRegion);
        }
        if config.access_key_id().is_some() != config.secret_access_key().is_some() {
            return Err(ClientBuildError::PartialCredentials);
        }
        self.inner.build(config)
    }
}

/// Returns `true` if `region` is a syntactically valid region name.
pub fn is_valid_region(region: &str) -> bool {
    let bytes = region.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            bytes.len() <= 63
                && first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'-')
        }
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// A transport client plus its verb bindings.
///
/// Built once per configuration and never mutated afterwards.
pub struct Endpoint {
    transport: Transport,
    client: Arc<dyn TransportClient>,
    bindings: BTreeMap<Verb, &'static str>,
}

impl Endpoint {
    /// Builds an endpoint for `config` using `factory`.
    ///
    /// Any factory failure becomes [`AgencyError::EndpointInstantiationFailed`]
    /// carrying the redacted configuration.
    pub fn build(config: &Configuration, factory: &dyn ClientFactory) -> Result<Self> {
        let transport = config.transport();
        let client = factory.build(config).map_err(|source| {
            error!(%transport, error = %source, "transport client construction failed");
            AgencyError::endpoint_instantiation_failed(config, source)
        })?;

        let bindings: BTreeMap<Verb, &'static str> = interface_of(transport).iter().collect();
        info!(%transport, verbs = ?bindings.keys().collect::<Vec<_>>(), "endpoint ready");
        Ok(Self { transport, client, bindings })
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// Returns `true` if this endpoint has `verb` bound.
    pub fn supports(&self, verb: Verb) -> bool {
        self.bindings.contains_key(&verb)
    }

    /// Returns the operation bound to `verb`.
    pub fn operation(&self, verb: Verb) -> Result<&'static str> {
        self.bindings
            .get(&verb)
            .copied()
            .ok_or_else(|| AgencyError::capability_not_supported(self.transport, verb))
    }

    /// Invokes the operation bound to `verb` once.
    ///
    /// The outer `Result` reports a missing capability before any call is
    /// made; the inner one is the transport's answer.
    pub async fn call(
        &self,
        verb: Verb,
        payload: Payload,
    ) -> Result<std::result::Result<Payload, TransportError>> {
        let operation = self.operation(verb)?;
        debug!(transport = %self.transport, %verb, operation, "invoking transport operation");
        Ok(self.client.invoke(operation, payload).await)
    }

    pub async fn create_target(&self, payload: Payload) -> Result<std::result::Result<Payload, TransportError>> {
        self.call(Verb::CreateTarget, payload).await
    }

    pub async fn send(&self, payload: Payload) -> Result<std::result::Result<Payload, TransportError>> {
        self.call(Verb::Send, payload).await
    }

    pub async fn receive(&self, payload: Payload) -> Result<std::result::Result<Payload, TransportError>> {
        self.call(Verb::Receive, payload).await
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("transport", &self.transport)
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Bound actions
// ---------------------------------------------------------------------------

/// An [`Action`] invoking one bound verb with a fixed payload.
///
/// The verb is resolved when the invocation is built, so performing it can
/// only fail with a transport error.
pub struct Invocation {
    endpoint: Arc<Endpoint>,
    verb: Verb,
    operation: &'static str,
    payload: Payload,
}

impl Invocation {
    /// Binds `verb` on `endpoint` to `payload`.
    pub fn new(endpoint: Arc<Endpoint>, verb: Verb, payload: Payload) -> Result<Self> {
        let operation = endpoint.operation(verb)?;
        Ok(Self { endpoint, verb, operation, payload })
    }

    /// Binds an operation already resolved from `endpoint` for `verb`.
    pub(crate) fn resolved(endpoint: Arc<Endpoint>, verb: Verb, operation: &'static str, payload: Payload) -> Self {
        Self { endpoint, verb, operation, payload }
    }
}

#[async_trait]
impl Action for Invocation {
    async fn perform(&self) -> Outcome {
        debug!(transport = %self.endpoint.transport, verb = %self.verb, operation = self.operation, "invoking bound verb");
        self.endpoint.client.invoke(self.operation, self.payload.clone()).await.map_err(Into::into)
    }

    fn describe(&self) -> String {
        format!("{}:{}", self.endpoint.transport, self.operation)
    }

    fn payload(&self) -> Option<&Payload> {
        Some(&self.payload)
    }
}
