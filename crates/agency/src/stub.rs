//! Scripted transport for tests and local development.
//!
//! [`StubClient`] answers each operation from a FIFO queue of canned
//! responses and errors, and records every call it receives. Clones share
//! state, so a test can keep a handle after handing the client to an
//! [`crate::Endpoint`] and inspect what was sent.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::config::Configuration;
use crate::endpoint::{ClientFactory, TransportClient};
use crate::errors::{ClientBuildError, TransportError};
use crate::types::Payload;

type Scripted = std::result::Result<Payload, TransportError>;

#[derive(Default)]
struct StubState {
    scripts: HashMap<String, VecDeque<Scripted>>,
    calls: Vec<(String, Payload)>,
}

/// A [`TransportClient`] replaying scripted answers per operation.
#[derive(Clone, Default)]
pub struct StubClient {
    state: Arc<Mutex<StubState>>,
}

impl StubClient {
    /// Creates a client with nothing scripted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful response for `operation`.
    #[must_use]
    pub fn with_response(self, operation: &str, response: Payload) -> Self {
        self.push(operation, Ok(response));
        self
    }

    /// Queues an error for `operation`.
    #[must_use]
    pub fn with_error(self, operation: &str, error: TransportError) -> Self {
        self.push(operation, Err(error));
        self
    }

    /// Queues `count` service errors with `code` for `operation`.
    #[must_use]
    pub fn with_errors(self, operation: &str, code: &str, count: usize) -> Self {
        for _ in 0..count {
            self.push(operation, Err(TransportError::service(operation, code, "stubbed error")));
        }
        self
    }

    /// Every call received so far as `(operation, payload)`, oldest first.
    pub fn calls(&self) -> Vec<(String, Payload)> {
        self.lock().calls.clone()
    }

    /// Number of scripted answers not yet consumed, across all operations.
    pub fn pending(&self) -> usize {
        self.lock().scripts.values().map(VecDeque::len).sum()
    }

    fn push(&self, operation: &str, answer: Scripted) {
        self.lock().scripts.entry(operation.to_string()).or_default().push_back(answer);
    }

    fn lock(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TransportClient for StubClient {
    async fn invoke(&self, operation: &str, payload: Payload) -> Scripted {
        let mut state = self.lock();
        state.calls.push((operation.to_string(), payload));
        state
            .scripts
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(TransportError::service(operation, "StubExhausted", "no scripted answer left")))
    }
}

// ---------------------------------------------------------------------------

/// A [`ClientFactory`] handing out one [`StubClient`], or always failing.
pub struct StubFactory {
    outcome: std::result::Result<StubClient, ClientBuildError>,
}

impl StubFactory {
    /// Every build returns a clone of `client`.
    pub fn new(client: StubClient) -> Self {
        Self { outcome: Ok(client) }
    }

    /// Every build fails with `error`.
    pub fn failing(error: ClientBuildError) -> Self {
        Self { outcome: Err(error) }
    }
}

impl ClientFactory for StubFactory {
    fn build(&self, _config: &Configuration) -> std::result::Result<Arc<dyn TransportClient>, ClientBuildError> {
        match &self.outcome {
            Ok(client) => Ok(Arc::new(client.clone())),
            Err(error) => Err(error.clone()),
        }
    }
}
