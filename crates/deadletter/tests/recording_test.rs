//! A coordinator that exhausts its retries leaves exactly one deadletter.

use std::sync::Arc;

use agency::stub::{StubClient, StubFactory};
use agency::{Configuration, ContingencyConfig, Coordinator, Endpoint, Publisher, RoleKind, Transport};
use anyhow::Result;
use deadletter::{DeadletterError, DeadletterStore};
use serde_json::{json, Value};

fn queue(client: &StubClient) -> Result<Arc<Endpoint>> {
    let config = Configuration::new(Transport::Sqs).with_region("us-east-1");
    Ok(Arc::new(Endpoint::build(&config, &StubFactory::new(client.clone()))?))
}

#[tokio::test]
async fn exhausted_publish_is_deadlettered() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = Arc::new(DeadletterStore::new(dir.path()));
    let config = ContingencyConfig::new()
        .with_max_retries(1)
        .with_record_failure_provider(store.record_failure_provider(RoleKind::Publisher));

    let client = StubClient::new().with_errors("send_message", "500", 2);
    let publisher = Publisher::new(Coordinator::from_config(queue(&client)?, &config))?;

    let completion = publisher.publish(json!({ "MessageBody": "undeliverable" })).await;
    let effort = completion.effort().expect("coordinated");
    assert!(!effort.succeeded());

    let letter = store.take_oldest(RoleKind::Publisher).await?;
    let record: Value = serde_json::from_str(&letter.body)?;
    assert_eq!(record["effort_id"], effort.id().to_string());
    assert_eq!(record["action"], "sqs:send_message");
    assert_eq!(record["payload"], json!({ "MessageBody": "undeliverable" }));
    assert_eq!(record["attempts"], 2);

    assert!(matches!(
        store.take_oldest(RoleKind::Publisher).await,
        Err(DeadletterError::Empty { role: RoleKind::Publisher })
    ));
    Ok(())
}

#[tokio::test]
async fn successful_publish_writes_nothing() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = Arc::new(DeadletterStore::new(dir.path()));
    let config =
        ContingencyConfig::new().with_record_failure_provider(store.record_failure_provider(RoleKind::Publisher));

    let client = StubClient::new()
        .with_errors("send_message", "500", 1)
        .with_response("send_message", json!({ "MessageId": "m-1" }));
    let publisher = Publisher::new(Coordinator::from_config(queue(&client)?, &config))?;

    assert!(publisher.publish(json!({ "MessageBody": "fine" })).await.is_successful());
    assert!(!store.path_for(RoleKind::Publisher).exists());
    Ok(())
}

#[tokio::test]
async fn unwritable_store_does_not_change_the_effort() -> Result<()> {
    let dir = tempfile::tempdir()?;
    // A regular file where the store expects its root directory.
    let blocker = dir.path().join("blocked");
    std::fs::write(&blocker, "")?;
    let store = Arc::new(DeadletterStore::new(&blocker));
    let config = ContingencyConfig::new()
        .with_max_retries(0)
        .with_record_failure_provider(store.record_failure_provider(RoleKind::Publisher));

    let client = StubClient::new().with_errors("send_message", "500", 1);
    let publisher = Publisher::new(Coordinator::from_config(queue(&client)?, &config))?;

    let completion = publisher.publish(json!({ "MessageBody": "lost" })).await;
    assert_eq!(completion.effort().map(|e| e.attempts().len()), Some(1));
    assert!(!completion.is_successful());
    Ok(())
}
