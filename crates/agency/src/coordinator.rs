//! Runs actions once or under a contingency.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info_span, warn, Instrument};

use crate::action::{Outcome, SharedAction};
use crate::contingency::{ContingencyConfig, ContingencyPolicy, FailureContext};
use crate::effort::Effort;
use crate::endpoint::Endpoint;
use crate::identifiers::EffortId;

/// What [`Coordinator::execute`] produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Completion {
    /// No contingency: the action's only outcome, untouched.
    Single(Outcome),
    /// Under a contingency: the full attempt history.
    Coordinated(Effort),
}

impl Completion {
    /// The outcome callers usually care about: the single outcome, or the
    /// effort's culmination.
    pub fn outcome(&self) -> &Outcome {
        match self {
            Self::Single(outcome) => outcome,
            Self::Coordinated(effort) => effort.culmination(),
        }
    }

    pub fn is_successful(&self) -> bool {
        self.outcome().is_ok()
    }

    pub fn effort(&self) -> Option<&Effort> {
        match self {
            Self::Single(_) => None,
            Self::Coordinated(effort) => Some(effort),
        }
    }

    pub fn into_effort(self) -> Option<Effort> {
        match self {
            Self::Single(_) => None,
            Self::Coordinated(effort) => Some(effort),
        }
    }
}

// ---------------------------------------------------------------------------

/// Pairs an [`Endpoint`] with an optional [`ContingencyPolicy`].
#[derive(Debug, Clone)]
pub struct Coordinator {
    endpoint: Arc<Endpoint>,
    contingency: Option<ContingencyPolicy>,
}

impl Coordinator {
    /// Creates a coordinator that retries according to `contingency`, if any.
    pub fn new(endpoint: Arc<Endpoint>, contingency: Option<ContingencyPolicy>) -> Self {
        Self { endpoint, contingency }
    }

    /// Creates a coordinator that performs every action exactly once.
    pub fn without_contingency(endpoint: Arc<Endpoint>) -> Self {
        Self::new(endpoint, None)
    }

    /// Creates a coordinator from a declarative config; an empty config means
    /// no contingency.
    pub fn from_config(endpoint: Arc<Endpoint>, config: &ContingencyConfig) -> Self {
        Self::new(endpoint, config.policy())
    }

    pub fn endpoint(&self) -> &Arc<Endpoint> {
        &self.endpoint
    }

    pub fn has_contingency(&self) -> bool {
        self.contingency.is_some()
    }

    /// Executes `action`.
    ///
    /// Without a contingency the action is performed once and its outcome
    /// returned as [`Completion::Single`]. With one, the action runs under the
    /// contingency's retry policy and every attempt is returned as
    /// [`Completion::Coordinated`]. If the final attempt failed, the failure
    /// recorder runs; its own outcome is logged and otherwise discarded.
    pub async fn execute(&self, action: SharedAction) -> Completion {
        let Some(contingency) = &self.contingency else {
            return Completion::Single(action.perform().await);
        };

        let id = EffortId::new_random();
        let span = info_span!("effort", effort_id = %id, action = %action.describe());
        async {
            let effort = contingency.retry_policy_for(Arc::clone(&action)).run().await.with_id(id);

            if effort.final_attempt().is_err() {
                let description = action.describe();
                let context = FailureContext {
                    description: &description,
                    payload: action.payload(),
                    effort: &effort,
                };
                let recorder = contingency.failure_recorder_for(&context);
                if let Err(e) = recorder.perform().await {
                    warn!(recorder = %recorder.describe(), error = %e, "failed to record failure");
                }
            }

            Completion::Coordinated(effort)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use serde_json::{json, Value};

    use super::*;
    use crate::action::Call;
    use crate::config::Configuration;
    use crate::contingency::RecordFailureProvider;
    use crate::directory::Transport;
    use crate::errors::{Failure, TransportError};
    use crate::stub::{StubClient, StubFactory};

    fn endpoint() -> Arc<Endpoint> {
        let config = Configuration::new(Transport::Sqs).with_region("us-east-1");
        Arc::new(Endpoint::build(&config, &StubFactory::new(StubClient::new())).unwrap())
    }

    fn always_failing(calls: &Arc<AtomicU32>) -> SharedAction {
        let seen = Arc::clone(calls);
        Arc::new(Call::new("always failing", move || {
            seen.fetch_add(1, Ordering::SeqCst);
            async { Err(Failure::from(TransportError::service("send_message", "500", "boom"))) }
        }))
    }

    fn capturing_recorder(records: &Arc<Mutex<Vec<String>>>) -> RecordFailureProvider {
        let records = Arc::clone(records);
        Arc::new(move |context: &FailureContext<'_>| {
            let records = Arc::clone(&records);
            let record = context.record();
            Arc::new(Call::new("capture", move || {
                records.lock().unwrap().push(record.clone());
                async { Ok(Value::Null) }
            })) as SharedAction
        })
    }

    #[tokio::test]
    async fn without_contingency_performs_once_and_returns_outcome_verbatim() {
        let calls = Arc::new(AtomicU32::new(0));
        let coordinator = Coordinator::without_contingency(endpoint());

        let completion = coordinator.execute(always_failing(&calls)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(completion.effort().is_none());
        assert_eq!(
            completion,
            Completion::Single(Err(TransportError::service("send_message", "500", "boom").into()))
        );
    }

    #[tokio::test]
    async fn empty_config_means_no_contingency() {
        let coordinator = Coordinator::from_config(endpoint(), &ContingencyConfig::new());
        assert!(!coordinator.has_contingency());
    }

    #[tokio::test]
    async fn exhaustion_records_failure_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let records = Arc::new(Mutex::new(Vec::new()));
        let config = ContingencyConfig::new()
            .with_max_retries(1)
            .with_record_failure_provider(capturing_recorder(&records));
        let coordinator = Coordinator::from_config(endpoint(), &config);

        let effort = coordinator.execute(always_failing(&calls)).await.into_effort().unwrap();
        assert_eq!(effort.attempts().len(), 2);
        assert!(effort.culmination().as_ref().is_err_and(Failure::is_retry_exhausted));

        let records = records.lock().unwrap();
        assert_eq!(records.len(), 1);
        let parsed: Value = serde_json::from_str(&records[0]).unwrap();
        assert_eq!(parsed["effort_id"], effort.id().to_string());
        assert_eq!(parsed["attempts"], 2);
    }

    #[tokio::test]
    async fn success_does_not_record_failure() {
        let records = Arc::new(Mutex::new(Vec::new()));
        let policy = ContingencyPolicy::default().with_record_failure_provider(capturing_recorder(&records));
        let coordinator = Coordinator::new(endpoint(), Some(policy));

        let action: SharedAction = Arc::new(Call::new("ok", || async { Ok(json!({ "id": "abc" })) }));
        let completion = coordinator.execute(action).await;
        assert!(completion.is_successful());
        assert_eq!(completion.effort().map(|e| e.attempts().len()), Some(1));
        assert!(records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_recorder_does_not_mask_the_effort() {
        let calls = Arc::new(AtomicU32::new(0));
        let broken: RecordFailureProvider = Arc::new(|_: &FailureContext<'_>| {
            Arc::new(Call::new("broken recorder", || async { Err(Failure::action("disk full")) })) as SharedAction
        });
        let policy = ContingencyPolicy::default().with_record_failure_provider(broken);
        let coordinator = Coordinator::new(endpoint(), Some(policy));

        let effort = coordinator.execute(always_failing(&calls)).await.into_effort().unwrap();
        assert_eq!(effort.attempts().len(), 3);
        assert!(effort.culmination().as_ref().is_err_and(Failure::is_retry_exhausted));
    }
}
