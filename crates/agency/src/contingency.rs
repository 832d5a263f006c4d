//! Retry parameters and the retry primitive they configure.
//!
//! Two constructs, kept apart:
//!
//! - [`ContingencyConfig`] is plain data: the retry bound, a reaction to run on
//!   exhaustion, and optional providers. Every field remembers whether it was
//!   explicitly supplied, and an empty config produces no policy at all.
//! - [`ContingencyPolicy`] is what a [`crate::Coordinator`] holds. Both of its
//!   providers are always populated, so holding one is the whole answer to
//!   "does this coordinator retry?".
//!
//! Callers that just want the defaults use [`ContingencyPolicy::default`], or
//! [`default_policy`] to wrap a single action directly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::action::{Action, Call, SharedAction};
use crate::effort::Effort;
use crate::errors::{Failure, TransportError};
use crate::types::Payload;

/// Retries attempted after the initial attempt when none is configured.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Action run once when a retry policy exhausts its attempts.
pub type Reaction = SharedAction;

/// Builds a retry policy bound to one action.
pub type RetryPolicyProvider = Arc<dyn Fn(SharedAction) -> Box<dyn RetryPolicy> + Send + Sync>;

/// Builds the action that records a terminal failure.
pub type RecordFailureProvider = Arc<dyn Fn(&FailureContext<'_>) -> SharedAction + Send + Sync>;

// ---------------------------------------------------------------------------
// Retry primitive
// ---------------------------------------------------------------------------

/// A retry policy already bound to its action.
#[async_trait]
pub trait RetryPolicy: Send + Sync {
    /// Performs the bound action until it succeeds or attempts run out.
    async fn run(&self) -> Effort;
}

/// Retry policy that records every attempt.
///
/// Performs the action up to `max_retries + 1` times, stopping at the first
/// success. All failures are treated alike. On exhaustion the reaction (if
/// any) runs once and the culmination is [`Failure::RetryExhausted`].
pub struct RecordedRetryPolicy {
    action: SharedAction,
    max_retries: u32,
    reaction: Option<Reaction>,
    delay: Duration,
}

impl RecordedRetryPolicy {
    /// Binds a policy with default settings to `action`.
    pub fn new(action: SharedAction) -> Self {
        Self { action, max_retries: DEFAULT_MAX_RETRIES, reaction: None, delay: Duration::ZERO }
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_reaction(mut self, reaction: Option<Reaction>) -> Self {
        self.reaction = reaction;
        self
    }

    /// Sets a fixed pause between attempts (zero by default).
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl RetryPolicy for RecordedRetryPolicy {
    async fn run(&self) -> Effort {
        let label = self.action.describe();
        let mut attempts = Vec::new();

        for attempt in 0..=self.max_retries {
            if attempt > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let outcome = self.action.perform().await;
            let succeeded = outcome.is_ok();
            let server_error = outcome
                .as_ref()
                .err()
                .and_then(Failure::as_transport)
                .is_some_and(TransportError::is_server_error);
            debug!(action = %label, attempt, succeeded, server_error, "attempt finished");
            attempts.push(outcome);
            if succeeded {
                break;
            }
        }

        if let Some(Ok(value)) = attempts.last() {
            return Effort::new(Ok(value.clone()), attempts);
        }

        let last_error = match attempts.last() {
            Some(Err(e)) => e.to_string(),
            _ => String::new(),
        };
        let count = u32::try_from(attempts.len()).unwrap_or(u32::MAX);
        warn!(action = %label, attempts = count, error = %last_error, "retries exhausted");

        if let Some(reaction) = &self.reaction {
            if let Err(e) = reaction.perform().await {
                warn!(reaction = %reaction.describe(), error = %e, "reaction failed");
            }
        }

        Effort::new(Err(Failure::RetryExhausted { attempts: count, last_error }), attempts)
    }
}

/// Wraps `action` in a retry policy with the default bound and no reaction.
pub fn default_policy(action: SharedAction) -> Box<dyn RetryPolicy> {
    Box::new(RecordedRetryPolicy::new(action))
}

// ---------------------------------------------------------------------------
// Failure recording
// ---------------------------------------------------------------------------

/// What a failure recorder is told about a terminal failure.
#[derive(Debug, Clone, Copy)]
pub struct FailureContext<'a> {
    /// Label of the action that failed.
    pub description: &'a str,
    /// Payload the action carried, if any.
    pub payload: Option<&'a Payload>,
    /// The failed effort.
    pub effort: &'a Effort,
}

impl FailureContext<'_> {
    /// Renders the failure as a single-line JSON record.
    pub fn record(&self) -> String {
        let error = match self.effort.culmination() {
            Err(e) => e.to_string(),
            Ok(_) => String::new(),
        };
        json!({
            "effort_id": self.effort.id().to_string(),
            "action": self.description,
            "payload": self.payload.cloned().unwrap_or(Value::Null),
            "attempts": self.effort.attempts().len(),
            "error": error,
        })
        .to_string()
    }
}

/// Recorder used when no record-failure provider is configured: logs the
/// failure record at `warn` and persists nothing.
pub fn log_failure_provider() -> RecordFailureProvider {
    Arc::new(|context: &FailureContext<'_>| {
        let record = context.record();
        Arc::new(Call::new("log failure", move || {
            let record = record.clone();
            async move {
                warn!(%record, "unrecorded failure");
                Ok(Value::Null)
            }
        })) as SharedAction
    })
}

// ---------------------------------------------------------------------------
// Configuration and policy
// ---------------------------------------------------------------------------

/// Declarative retry parameters.
///
/// A config with nothing supplied yields no policy; see
/// [`ContingencyConfig::policy`].
#[derive(Clone, Default)]
pub struct ContingencyConfig {
    max_retries: Option<u32>,
    reaction: Option<Reaction>,
    retry_policy_provider: Option<RetryPolicyProvider>,
    record_failure_provider: Option<RecordFailureProvider>,
}

impl ContingencyConfig {
    /// Creates an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sets the action run when the default retry policy is exhausted.
    #[must_use]
    pub fn with_reaction(mut self, reaction: impl Action + 'static) -> Self {
        self.reaction = Some(Arc::new(reaction));
        self
    }

    /// Replaces the default retry policy.
    ///
    /// A custom provider owns its own bound and reaction; `max_retries` and
    /// `reaction` on this config are then ignored.
    #[must_use]
    pub fn with_retry_policy_provider<F>(mut self, provider: F) -> Self
    where
        F: Fn(SharedAction) -> Box<dyn RetryPolicy> + Send + Sync + 'static,
    {
        self.retry_policy_provider = Some(Arc::new(provider));
        self
    }

    /// Sets how terminal failures are recorded.
    #[must_use]
    pub fn with_record_failure_provider(mut self, provider: RecordFailureProvider) -> Self {
        self.record_failure_provider = Some(provider);
        self
    }

    /// Configured bound, or [`DEFAULT_MAX_RETRIES`].
    pub fn max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES)
    }

    /// Returns `true` if nothing was supplied.
    pub fn is_empty(&self) -> bool {
        self.max_retries.is_none()
            && self.reaction.is_none()
            && self.retry_policy_provider.is_none()
            && self.record_failure_provider.is_none()
    }

    /// Resolves this config into a policy with both providers populated.
    ///
    /// Returns `None` for an empty config.
    pub fn policy(&self) -> Option<ContingencyPolicy> {
        if self.is_empty() {
            return None;
        }

        let retry_policy_provider = self.retry_policy_provider.clone().unwrap_or_else(|| {
            let max_retries = self.max_retries();
            let reaction = self.reaction.clone();
            Arc::new(move |action: SharedAction| {
                Box::new(
                    RecordedRetryPolicy::new(action)
                        .with_max_retries(max_retries)
                        .with_reaction(reaction.clone()),
                ) as Box<dyn RetryPolicy>
            })
        });
        let record_failure_provider =
            self.record_failure_provider.clone().unwrap_or_else(log_failure_provider);

        Some(ContingencyPolicy { retry_policy_provider, record_failure_provider })
    }
}

impl std::fmt::Debug for ContingencyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContingencyConfig")
            .field("max_retries", &self.max_retries)
            .field("reaction", &self.reaction.as_ref().map(|r| r.describe()))
            .field("retry_policy_provider", &self.retry_policy_provider.is_some())
            .field("record_failure_provider", &self.record_failure_provider.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------

/// A fully resolved contingency: how to retry, and how to record failure.
#[derive(Clone)]
pub struct ContingencyPolicy {
    retry_policy_provider: RetryPolicyProvider,
    record_failure_provider: RecordFailureProvider,
}

impl ContingencyPolicy {
    /// Creates a policy from explicit providers.
    pub fn new(
        retry_policy_provider: RetryPolicyProvider,
        record_failure_provider: RecordFailureProvider,
    ) -> Self {
        Self { retry_policy_provider, record_failure_provider }
    }

    /// Returns a copy recording failures through `provider`.
    #[must_use]
    pub fn with_record_failure_provider(mut self, provider: RecordFailureProvider) -> Self {
        self.record_failure_provider = provider;
        self
    }

    /// Binds a retry policy to `action`.
    pub fn retry_policy_for(&self, action: SharedAction) -> Box<dyn RetryPolicy> {
        (self.retry_policy_provider)(action)
    }

    /// Builds the action that records `context`.
    pub fn failure_recorder_for(&self, context: &FailureContext<'_>) -> SharedAction {
        (self.record_failure_provider)(context)
    }
}

impl Default for ContingencyPolicy {
    fn default() -> Self {
        Self { retry_policy_provider: Arc::new(default_policy), record_failure_provider: log_failure_provider() }
    }
}

impl std::fmt::Debug for ContingencyPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContingencyPolicy").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use serde_json::json;

    use super::*;
    use crate::errors::TransportError;

    /// Fails `failures` times, then succeeds with `{"id": "abc"}`.
    fn flaky(failures: u32) -> (SharedAction, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&calls);
        let action = Call::new("flaky", move || {
            let n = seen.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < failures {
                    Err(Failure::from(TransportError::service("send_message", "500", "boom")))
                } else {
                    Ok(json!({ "id": "abc" }))
                }
            }
        });
        (Arc::new(action), calls)
    }

    #[tokio::test]
    async fn stops_at_first_success() {
        for k in 0..=3 {
            let (action, calls) = flaky(k);
            let effort = RecordedRetryPolicy::new(action).with_max_retries(3).run().await;
            assert!(effort.succeeded());
            assert_eq!(effort.attempts().len() as u32, k + 1);
            assert!(effort.attempts()[..k as usize].iter().all(Result::is_err));
            assert_eq!(effort.final_attempt(), &Ok(json!({ "id": "abc" })));
            assert_eq!(calls.load(Ordering::SeqCst), k + 1);
        }
    }

    #[tokio::test]
    async fn exhaustion_is_bounded_and_reported() {
        for n in 0..4 {
            let (action, calls) = flaky(u32::MAX);
            let effort = RecordedRetryPolicy::new(action).with_max_retries(n).run().await;
            assert_eq!(effort.attempts().len() as u32, n + 1);
            assert_eq!(calls.load(Ordering::SeqCst), n + 1);
            assert!(matches!(
                effort.culmination(),
                Err(Failure::RetryExhausted { attempts, .. }) if *attempts == n + 1
            ));
            assert!(effort.final_attempt().is_err());
        }
    }

    #[tokio::test]
    async fn reaction_runs_once_on_exhaustion_only() {
        let reactions = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&reactions);
        let reaction: Reaction = Arc::new(Call::new("react", move || {
            seen.fetch_add(1, Ordering::SeqCst);
            async { Ok(Value::Null) }
        }));

        let (failing, _) = flaky(u32::MAX);
        RecordedRetryPolicy::new(failing).with_reaction(Some(Arc::clone(&reaction))).run().await;
        assert_eq!(reactions.load(Ordering::SeqCst), 1);

        let (succeeding, _) = flaky(1);
        RecordedRetryPolicy::new(succeeding).with_reaction(Some(reaction)).run().await;
        assert_eq!(reactions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn default_policy_allows_two_retries() {
        let (action, calls) = flaky(u32::MAX);
        let effort = default_policy(action).run().await;
        assert_eq!(effort.attempts().len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn empty_config_has_no_policy() {
        assert!(ContingencyConfig::new().is_empty());
        assert!(ContingencyConfig::new().policy().is_none());
        assert!(ContingencyConfig::new().with_max_retries(0).policy().is_some());
        assert_eq!(ContingencyConfig::new().max_retries(), DEFAULT_MAX_RETRIES);
    }

    #[tokio::test]
    async fn config_bound_flows_into_policy() {
        let policy = ContingencyConfig::new().with_max_retries(0).policy().unwrap();
        let (action, calls) = flaky(u32::MAX);
        let effort = policy.retry_policy_for(action).run().await;
        assert_eq!(effort.attempts().len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failure_record_is_single_line_json() {
        let effort = Effort::new(
            Err(Failure::RetryExhausted { attempts: 1, last_error: "boom\nagain".into() }),
            vec![Err(Failure::action("boom"))],
        );
        let payload = json!({ "Message": "hello\nworld" });
        let record = FailureContext { description: "sns:publish", payload: Some(&payload), effort: &effort }
            .record();
        assert!(!record.contains('\n'));

        let parsed: Value = serde_json::from_str(&record).unwrap();
        assert_eq!(parsed["action"], "sns:publish");
        assert_eq!(parsed["payload"], payload);
        assert_eq!(parsed["attempts"], 1);
    }
}
