//! The unit of work coordinated by this crate.
//!
//! An [`Action`] is performed to produce an [`Outcome`]. Transport calls,
//! failure reactions and failure recorders are all actions, so one retry
//! primitive and one coordinator serve every case.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::Failure;
use crate::types::Payload;

/// Result of performing an action once.
pub type Outcome = std::result::Result<Payload, Failure>;

/// Something that can be performed, possibly more than once.
///
/// Implementations must tolerate repeated calls to [`Action::perform`]; a
/// retry policy re-performs the same action after each failure.
#[async_trait]
pub trait Action: Send + Sync {
    /// Performs the action once.
    async fn perform(&self) -> Outcome;

    /// Short human-readable label used in logs and failure records.
    fn describe(&self) -> String {
        "action".to_string()
    }

    /// The payload this action carries, if any.
    fn payload(&self) -> Option<&Payload> {
        None
    }
}

/// Shared, type-erased action.
pub type SharedAction = Arc<dyn Action>;

// ---------------------------------------------------------------------------

/// An [`Action`] backed by an async closure.
///
/// ```
/// use agency::{Action, Call};
/// use serde_json::json;
///
/// # async fn example() {
/// let ping = Call::new("ping", || async { Ok(json!("pong")) });
/// assert_eq!(ping.perform().await.unwrap(), json!("pong"));
/// # }
/// ```
pub struct Call<F> {
    name: String,
    f: F,
}

impl<F, Fut> Call<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    /// Wraps `f` under the label `name`.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

#[async_trait]
impl<F, Fut> Action for Call<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    async fn perform(&self) -> Outcome {
        (self.f)().await
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}
