//! End-to-end tests for roles running over scripted transports.
//!
//! Each test builds endpoints through the validating factory, wires them into
//! coordinators, and drives publishers, consumers and agents against a
//! [`StubClient`] whose answers are scripted per operation.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use agency::stub::{StubClient, StubFactory};
use agency::{
    Agent, AgencyError, Call, Completion, Configuration, Consumer, ContingencyConfig, Coordinator,
    Endpoint, Failure, FailureContext, Publisher, RecordFailureProvider, SharedAction, Transport,
    ValidatingFactory, Verb,
};
use anyhow::Result;
use serde_json::{json, Value};

fn endpoint(transport: Transport, client: &StubClient) -> Result<Arc<Endpoint>> {
    let config = Configuration::new(transport)
        .with_region("us-east-1")
        .with_access_key_id("AKIDEXAMPLE")
        .with_secret_access_key("wJalrXUtnFEMI");
    let factory = ValidatingFactory::new(StubFactory::new(client.clone()));
    Ok(Arc::new(Endpoint::build(&config, &factory)?))
}

fn capturing(records: &Arc<Mutex<Vec<String>>>) -> RecordFailureProvider {
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

/// Two server errors, then success: three attempts and a successful culmination.
#[tokio::test]
async fn queue_publish_recovers_after_transient_errors() -> Result<()> {
    let client = StubClient::new()
        .with_errors("send_message", "500", 2)
        .with_response("send_message", json!({ "id": "abc" }));
    let records = Arc::new(Mutex::new(Vec::new()));
    let config = ContingencyConfig::new()
        .with_max_retries(2)
        .with_record_failure_provider(capturing(&records));
    let publisher = Publisher::new(Coordinator::from_config(endpoint(Transport::Sqs, &client)?, &config))?;

    let effort = publisher.publish(json!({ "MessageBody": "hello" })).await.into_effort().unwrap();

    assert_eq!(effort.attempts().len(), 3);
    assert_eq!(effort.retries().len(), 2);
    assert!(effort.initial_attempt().is_err());
    assert_eq!(effort.final_attempt(), &Ok(json!({ "id": "abc" })));
    assert_eq!(effort.culmination(), &Ok(json!({ "id": "abc" })));
    assert_eq!(effort.to_string(), "<Effort:succeeded:retries>");
    assert!(records.lock().unwrap().is_empty());
    assert_eq!(client.pending(), 0);
    Ok(())
}

/// Every attempt fails: `max_retries + 1` attempts, one failure record.
#[tokio::test]
async fn queue_publish_exhausts_retries_and_records_once() -> Result<()> {
    let client = StubClient::new().with_errors("send_message", "500", 4);
    let records = Arc::new(Mutex::new(Vec::new()));
    let config = ContingencyConfig::new()
        .with_max_retries(3)
        .with_record_failure_provider(capturing(&records));
    let publisher = Publisher::new(Coordinator::from_config(endpoint(Transport::Sqs, &client)?, &config))?;

    let effort = publisher.publish(json!({ "MessageBody": "lost" })).await.into_effort().unwrap();

    assert_eq!(effort.attempts().len(), 4);
    assert!(effort.attempts().iter().all(|attempt| attempt.is_err()));
    assert!(matches!(effort.culmination(), Err(Failure::RetryExhausted { attempts: 4, .. })));
    assert_eq!(effort.to_string(), "<Effort:failed:retries>");

    let records = records.lock().unwrap();
    assert_eq!(records.len(), 1);
    let record: Value = serde_json::from_str(&records[0])?;
    assert_eq!(record["action"], "sqs:send_message");
    assert_eq!(record["payload"], json!({ "MessageBody": "lost" }));
    assert_eq!(record["attempts"], 4);
    Ok(())
}

/// The reaction runs exactly once, and only on exhaustion.
#[tokio::test]
async fn reaction_runs_once_on_exhaustion() -> Result<()> {
    let reactions = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&reactions);
    let config = ContingencyConfig::new().with_max_retries(1).with_reaction(Call::new("alert", move || {
        seen.fetch_add(1, Ordering::SeqCst);
        async { Ok(Value::Null) }
    }));

    let client = StubClient::new()
        .with_errors("publish", "503", 2)
        .with_response("publish", json!({ "MessageId": "m-2" }));
    let publisher = Publisher::new(Coordinator::from_config(endpoint(Transport::Sns, &client)?, &config))?;

    assert!(!publisher.publish(json!({ "Message": "first" })).await.is_successful());
    assert_eq!(reactions.load(Ordering::SeqCst), 1);

    assert!(publisher.publish(json!({ "Message": "second" })).await.is_successful());
    assert_eq!(reactions.load(Ordering::SeqCst), 1);
    Ok(())
}

/// Without a contingency the raw transport outcome comes back unchanged.
#[tokio::test]
async fn plain_roles_perform_once() -> Result<()> {
    let client = StubClient::new()
        .with_errors("receive_message", "500", 1)
        .with_response("receive_message", json!({ "Messages": [] }));
    let consumer = Consumer::new(Coordinator::without_contingency(endpoint(Transport::Sqs, &client)?))?;

    let first = consumer.consume(json!({ "QueueUrl": "q" })).await;
    assert!(matches!(first, Completion::Single(Err(Failure::Transport(_)))));
    assert_eq!(client.calls().len(), 1);

    let second = consumer.consume(json!({ "QueueUrl": "q" })).await;
    assert_eq!(second, Completion::Single(Ok(json!({ "Messages": [] }))));
    Ok(())
}

/// An agent reads from one transport and writes to another.
#[tokio::test]
async fn agent_relays_between_transports() -> Result<()> {
    let logs = StubClient::new()
        .with_response("get_log_events", json!({ "events": [{ "message": "hello" }] }));
    let topic = StubClient::new().with_response("publish", json!({ "MessageId": "m-3" }));

    let consumer = Consumer::new(Coordinator::without_contingency(endpoint(Transport::Logs, &logs)?))?;
    let publisher = Publisher::new(Coordinator::from_config(
        endpoint(Transport::Sns, &topic)?,
        &ContingencyConfig::new().with_max_retries(0),
    ))?;
    let agent = Agent::from_roles(consumer.into(), publisher.into())?;
    assert_eq!(agent.to_string(), "<Agent|Consumer:logs|Publisher:sns:contingency>");

    let received = agent.consume(json!({ "logGroupName": "testing" })).await;
    let events = received.outcome().clone()?;
    let message = events["events"][0]["message"].clone();
    let sent = agent.publish(json!({ "Message": message })).await;

    assert!(sent.is_successful());
    assert_eq!(topic.calls(), vec![("publish".to_string(), json!({ "Message": "hello" }))]);
    Ok(())
}

#[tokio::test]
async fn create_target_goes_through_the_coordinator() -> Result<()> {
    let client = StubClient::new()
        .with_errors("create_queue", "500", 1)
        .with_response("create_queue", json!({ "QueueUrl": "https://queue/url" }));
    let publisher = Publisher::new(Coordinator::from_config(
        endpoint(Transport::Sqs, &client)?,
        &ContingencyConfig::new().with_max_retries(1),
    ))?;

    let completion = publisher.create_target(json!({ "QueueName": "some-queue" })).await?;
    assert_eq!(completion.effort().map(|e| e.attempts().len()), Some(2));
    assert_eq!(completion.outcome(), &Ok(json!({ "QueueUrl": "https://queue/url" })));
    Ok(())
}

#[test]
fn roles_reject_wrong_transports_and_kinds() -> Result<()> {
    let client = StubClient::new();
    let logs = Coordinator::without_contingency(endpoint(Transport::Logs, &client)?);
    assert!(matches!(
        Publisher::new(logs.clone()),
        Err(AgencyError::CapabilityNotSupported { verb: Verb::Send, .. })
    ));

    let consumer = Consumer::new(logs)?;
    let error = Agent::from_roles(consumer.clone().into(), consumer.into()).unwrap_err();
    assert!(matches!(error, AgencyError::RoleTypeMismatch { slot: "publisher", .. }));
    Ok(())
}
