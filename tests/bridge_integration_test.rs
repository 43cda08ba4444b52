//! End-to-end tests of the event bridge against the in-memory broker.

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::{json, Value};
use tasker_event_bridge::codec::{StaticTypeContext, StructType};
use tasker_event_bridge::constants::headers;
use tasker_event_bridge::messaging::{InMemoryBroker, IsolationLevel, ProducerRecord};
use tasker_event_bridge::models::{DeploymentEvent, MessageEvent, ProcessDefinition, SignalEvent};
use tasker_event_bridge::orchestration::{PublishError, PublishOutcome};
use tasker_event_bridge::{
    BridgeError, DeploymentEventListener, ProcessEventListener, PublishMode,
};

use common::*;

fn order_message(instance: i64, payload: Value) -> MessageEvent {
    MessageEvent {
        process_id: "orders".to_string(),
        process_instance_id: instance,
        message_name: "OrderPlaced".to_string(),
        payload,
    }
}

#[tokio::test]
async fn test_start_signal_goes_to_latest_version_only() {
    let broker = InMemoryBroker::new();
    let signaller = RecordingSignaller::new();
    let bridge = build_bridge(&broker, signaller.clone(), test_config());

    for id in ["org.acme:orders:1.0", "org.acme:orders:2.0"] {
        bridge
            .on_deploy(&signal_deployment(id, start_signal("NewOrder")))
            .await
            .unwrap();
    }
    broker.publish("NewOrder", envelope(json!("order-1")));

    let deliveries = signaller.wait_for(1, WAIT).await;
    tokio::time::sleep(SETTLE).await;
    assert_eq!(signaller.deliveries().len(), 1);
    assert_eq!(deliveries[0].deployment_id, "org.acme:orders:2.0");
    assert_eq!(deliveries[0].signal_name, "NewOrder");
    assert_eq!(deliveries[0].payload, json!("order-1"));

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_waiting_signal_is_broadcast_to_every_version() {
    let broker = InMemoryBroker::new();
    let signaller = RecordingSignaller::new();
    let bridge = build_bridge(&broker, signaller.clone(), test_config());

    for id in ["org.acme:orders:1.0", "org.acme:orders:2.0", "billing"] {
        bridge
            .on_deploy(&signal_deployment(id, waiting_signal("Paid")))
            .await
            .unwrap();
    }
    broker.publish("Paid", envelope(json!({"amount": 10})));

    signaller.wait_for(3, WAIT).await;
    assert_eq!(
        signaller.deployment_ids(),
        vec!["billing", "org.acme:orders:1.0", "org.acme:orders:2.0"]
    );

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_undeploying_latest_start_version_falls_back_to_previous() {
    let broker = InMemoryBroker::new();
    let signaller = RecordingSignaller::new();
    let bridge = build_bridge(&broker, signaller.clone(), test_config());

    let old = signal_deployment("org.acme:orders:1.0", start_signal("NewOrder"));
    let new = signal_deployment("org.acme:orders:2.0", start_signal("NewOrder"));
    bridge.on_deploy(&old).await.unwrap();
    bridge.on_deploy(&new).await.unwrap();
    bridge.on_undeploy(&new).await.unwrap();

    broker.publish("NewOrder", envelope(json!(1)));
    let deliveries = signaller.wait_for(1, WAIT).await;
    assert_eq!(deliveries[0].deployment_id, "org.acme:orders:1.0");

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_message_is_signalled_with_prefixed_name() {
    let broker = InMemoryBroker::new();
    let signaller = RecordingSignaller::new();
    let bridge = build_bridge(&broker, signaller.clone(), test_config());

    let event = deployment(
        "shipping",
        vec![ProcessDefinition::new("ship").with_message(waiting_message("Shipment", None))],
    );
    bridge.on_deploy(&event).await.unwrap();
    assert!(bridge.subscribed_topics().contains("Shipment"));

    broker.publish("Shipment", envelope(json!({"tracking": "T1"})));
    let deliveries = signaller.wait_for(1, WAIT).await;
    assert_eq!(deliveries[0].signal_name, "Message-Shipment");
    assert_eq!(deliveries[0].payload, json!({"tracking": "T1"}));

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_record_headers_reach_the_engine_as_caller_identity() {
    let broker = InMemoryBroker::new();
    let signaller = RecordingSignaller::new();
    let bridge = build_bridge(&broker, signaller.clone(), test_config());
    bridge
        .on_deploy(&signal_deployment("approvals", waiting_signal("Approve")))
        .await
        .unwrap();

    broker.publish_record(
        ProducerRecord::new("Approve", envelope(json!("first")))
            .with_header(headers::USER, "alice")
            .with_header(headers::PASSWORD, "secret")
            .with_header(headers::ASSERTION, "jwt-token"),
    );
    signaller.wait_for(1, WAIT).await;
    broker.publish("Approve", envelope(json!("second")));
    let deliveries = signaller.wait_for(2, WAIT).await;

    let caller = deliveries[0].caller.as_ref().expect("identity from headers");
    assert_eq!(caller.user(), Some("alice"));
    assert_eq!(
        caller.credentials.as_ref().map(|c| c.password.as_str()),
        Some("secret")
    );
    assert_eq!(caller.assertion.as_deref(), Some("jwt-token"));
    assert_eq!(deliveries[1].payload, json!("second"));
    assert!(deliveries[1].caller.is_none());

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_unreadable_records_are_dropped_and_polling_continues() {
    let broker = InMemoryBroker::new();
    let signaller = RecordingSignaller::new();
    let bridge = build_bridge(&broker, signaller.clone(), test_config());

    let context = StaticTypeContext::new("orders")
        .with_type(StructType::new("com.acme.Order").with_required_field("id"));
    let event = DeploymentEvent::new(
        "orders",
        Arc::new(context),
        vec![ProcessDefinition::new("p")
            .with_message(waiting_message("Order", Some("com.acme.Order")))],
    );
    bridge.on_deploy(&event).await.unwrap();

    broker.publish("Order", b"not json at all".to_vec());
    broker.publish("Order", envelope(json!({"total": 3})));
    broker.publish("Order", envelope(json!({"id": "o-7", "total": 3})));

    let deliveries = signaller.wait_for(1, WAIT).await;
    tokio::time::sleep(SETTLE).await;
    assert_eq!(signaller.deliveries().len(), 1);
    assert_eq!(deliveries[0].payload, json!({"id": "o-7", "total": 3}));

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_topic_and_codec_overrides() {
    let broker = InMemoryBroker::new();
    let signaller = RecordingSignaller::new();
    let mut config = test_config();
    config
        .topics
        .insert("Paid".to_string(), "payments.raw".to_string());
    config
        .codecs
        .readers
        .insert("payments.raw".to_string(), "raw-json".to_string());
    let bridge = build_bridge(&broker, signaller.clone(), config);

    bridge
        .on_deploy(&signal_deployment("billing", waiting_signal("Paid")))
        .await
        .unwrap();
    assert_eq!(
        bridge.subscribed_topics().into_iter().collect::<Vec<_>>(),
        vec!["payments.raw"]
    );

    broker.publish("payments.raw", br#"{"amount":42}"#.to_vec());
    let deliveries = signaller.wait_for(1, WAIT).await;
    assert_eq!(deliveries[0].signal_name, "Paid");
    assert_eq!(deliveries[0].payload, json!({"amount": 42}));

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_deployment_without_consumers_creates_no_consumer() {
    let broker = InMemoryBroker::new();
    let bridge = build_bridge(&broker, RecordingSignaller::new(), test_config());

    let thrown_only = deployment(
        "emitter",
        vec![ProcessDefinition::new("p")
            .with_signal(tasker_event_bridge::models::Descriptor::signal("Thrown", None))],
    );
    bridge.on_deploy(&thrown_only).await.unwrap();

    assert!(bridge.subscribed_topics().is_empty());
    assert!(!bridge.coordinator().is_active());
    assert_eq!(broker.consumers_created(), 0);

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_undeploy_unsubscribes_and_redeploy_reuses_consumer() {
    let broker = InMemoryBroker::new();
    let signaller = RecordingSignaller::new();
    let bridge = build_bridge(&broker, signaller.clone(), test_config());
    let event = signal_deployment("billing", waiting_signal("Paid"));

    bridge.on_deploy(&event).await.unwrap();
    assert_eq!(broker.subscribed_topics().len(), 1);

    bridge.on_undeploy(&event).await.unwrap();
    assert!(broker.subscribed_topics().is_empty());
    assert!(bridge.coordinator().table().is_empty());

    bridge.on_deploy(&event).await.unwrap();
    assert!(broker.subscribed_topics().contains("Paid"));
    assert_eq!(broker.consumers_created(), 1);

    broker.publish("Paid", envelope(json!(true)));
    signaller.wait_for(1, WAIT).await;

    bridge.shutdown().await;
    assert_eq!(broker.open_consumers(), 0);
}

#[tokio::test]
async fn test_concurrent_registrations_share_one_consumer() {
    let broker = InMemoryBroker::new();
    let signaller = RecordingSignaller::new();
    let bridge = build_bridge(&broker, signaller.clone(), test_config());

    let events: Vec<DeploymentEvent> = (0..8)
        .map(|i| signal_deployment(&format!("deployment-{i}"), waiting_signal(&format!("Topic{i}"))))
        .collect();
    let results = join_all(events.iter().map(|event| bridge.on_deploy(event))).await;
    assert!(results.iter().all(Result::is_ok));

    assert_eq!(broker.consumers_created(), 1);
    assert_eq!(bridge.subscribed_topics().len(), 8);
    assert_eq!(broker.subscribed_topics(), bridge.subscribed_topics());

    broker.publish("Topic5", envelope(json!(5)));
    let deliveries = signaller.wait_for(1, WAIT).await;
    assert_eq!(deliveries[0].deployment_id, "deployment-5");

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_engine_rejection_does_not_affect_other_deployments() {
    let broker = InMemoryBroker::new();
    let signaller = RecordingSignaller::new();
    signaller.reject_deployment("first");
    let bridge = build_bridge(&broker, signaller.clone(), test_config());

    for id in ["first", "second"] {
        bridge
            .on_deploy(&signal_deployment(id, waiting_signal("Paid")))
            .await
            .unwrap();
    }
    broker.publish("Paid", envelope(json!(1)));
    broker.publish("Paid", envelope(json!(2)));

    let deliveries = signaller.wait_for(2, WAIT).await;
    assert!(deliveries.iter().all(|d| d.deployment_id == "second"));

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_drains_in_flight_dispatch() {
    let broker = InMemoryBroker::new();
    let signaller = BlockingSignaller::new();
    let mut config = test_config();
    config.consumer.max_notify_threads = 1;
    let bridge = Arc::new(build_bridge(&broker, signaller.clone(), config));

    bridge
        .on_deploy(&signal_deployment("billing", waiting_signal("Paid")))
        .await
        .unwrap();
    broker.publish("Paid", envelope(json!(1)));
    tokio::time::timeout(WAIT, signaller.entered()).await.unwrap();

    // Queued behind the blocked dispatch
    broker.publish("Paid", envelope(json!(2)));
    tokio::time::sleep(SETTLE).await;

    let closing = Arc::clone(&bridge);
    let shutdown = tokio::spawn(async move { closing.shutdown().await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!shutdown.is_finished());

    // Published while shutdown waits for the in-flight dispatch
    broker.publish("Paid", envelope(json!(3)));
    signaller.release(3);
    tokio::time::timeout(WAIT, shutdown).await.unwrap().unwrap();
    tokio::time::sleep(SETTLE).await;
    assert_eq!(signaller.completed(), 1);
    assert!(bridge.is_shut_down());
    assert_eq!(broker.open_consumers(), 0);
}

#[tokio::test]
async fn test_consumer_settings_follow_configuration() {
    let broker = InMemoryBroker::new();
    let mut config = test_config();
    config.client.bootstrap_servers = "broker-1:9092,broker-2:9092".to_string();
    config.client.client_id = Some("bridge-1".to_string());
    config.consumer.group_id = "orders-bridge".to_string();
    config.consumer.allow_auto_create_topics = Some(false);
    let bridge = build_bridge(&broker, RecordingSignaller::new(), config);

    bridge
        .on_deploy(&signal_deployment("billing", waiting_signal("Paid")))
        .await
        .unwrap();

    let settings = broker.last_consumer_settings().unwrap();
    assert_eq!(settings.bootstrap_servers, "broker-1:9092,broker-2:9092");
    assert_eq!(settings.client_id.as_deref(), Some("bridge-1"));
    assert_eq!(settings.group_id, "orders-bridge");
    assert_eq!(settings.isolation_level, IsolationLevel::ReadCommitted);
    assert_eq!(settings.allow_auto_create_topics, Some(false));

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_consumer_creation_failure_is_retried_on_next_registration() {
    let broker = InMemoryBroker::new();
    let signaller = RecordingSignaller::new();
    let bridge = build_bridge(&broker, signaller.clone(), test_config());
    broker.fail_next_consumer_creation();

    let first = signal_deployment("billing", waiting_signal("Paid"));
    let error = bridge.on_deploy(&first).await.unwrap_err();
    assert!(matches!(error, BridgeError::Broker(_)));
    assert!(!bridge.coordinator().is_active());

    bridge
        .on_deploy(&signal_deployment("invoicing", waiting_signal("Invoiced")))
        .await
        .unwrap();
    assert!(bridge.coordinator().is_active());
    assert_eq!(
        broker.subscribed_topics().into_iter().collect::<Vec<_>>(),
        vec!["Invoiced", "Paid"]
    );

    broker.publish("Paid", envelope(json!(1)));
    let deliveries = signaller.wait_for(1, WAIT).await;
    assert_eq!(deliveries[0].deployment_id, "billing");

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_outbound_message_is_wrapped_in_cloud_event() {
    let broker = InMemoryBroker::new();
    let mut config = test_config();
    config.producer.publish_mode = PublishMode::Sync;
    let bridge = build_bridge(&broker, RecordingSignaller::new(), config);

    let outcome = bridge
        .on_message(order_message(77, json!({"id": "o-1"})))
        .await
        .unwrap();
    assert!(matches!(outcome, Some(PublishOutcome::Acknowledged(_))));

    let records = broker.records("OrderPlaced");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].key.as_deref(), Some("77"));
    let envelope: Value = serde_json::from_slice(&records[0].value).unwrap();
    assert_eq!(envelope["specversion"], "1.0");
    assert_eq!(envelope["type"], "OrderPlaced");
    assert_eq!(envelope["source"], "/process/orders/77");
    assert_eq!(envelope["data"], json!({"id": "o-1"}));

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_outbound_signal_round_trips_to_waiting_deployment() {
    let broker = InMemoryBroker::new();
    let signaller = RecordingSignaller::new();
    let bridge = build_bridge(&broker, signaller.clone(), test_config());

    bridge
        .on_deploy(&signal_deployment("billing", waiting_signal("Paid")))
        .await
        .unwrap();
    let outcome = bridge
        .on_signal(SignalEvent {
            process_id: "orders".to_string(),
            process_instance_id: 5,
            signal_name: "Paid".to_string(),
            payload: json!({"amount": 9}),
            node_implementation: None,
        })
        .await
        .unwrap();
    assert!(matches!(outcome, Some(PublishOutcome::Dispatched { .. })));

    let deliveries = signaller.wait_for(1, WAIT).await;
    assert_eq!(deliveries[0].payload, json!({"amount": 9}));

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_sync_publish_surfaces_broker_rejection() {
    let broker = InMemoryBroker::new();
    let mut config = test_config();
    config.producer.publish_mode = PublishMode::Sync;
    let bridge = build_bridge(&broker, RecordingSignaller::new(), config);
    broker.reject_sends(true);

    let error = bridge
        .on_message(order_message(1, json!(null)))
        .await
        .unwrap_err();
    assert!(matches!(error, BridgeError::Publish(PublishError::Broker(_))));
    assert!(broker.records("OrderPlaced").is_empty());

    broker.reject_sends(false);
    broker.interrupt_deliveries(true);
    let error = bridge
        .on_message(order_message(2, json!(null)))
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        BridgeError::Publish(PublishError::Interrupted { .. })
    ));

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_calls_after_shutdown_are_rejected() {
    let broker = InMemoryBroker::new();
    let bridge = build_bridge(&broker, RecordingSignaller::new(), test_config());
    let event = signal_deployment("billing", waiting_signal("Paid"));
    bridge.on_deploy(&event).await.unwrap();

    bridge.shutdown().await;
    assert!(bridge.subscribed_topics().is_empty());
    assert!(bridge.on_deploy(&event).await.unwrap_err().is_shut_down());
    assert!(bridge.on_undeploy(&event).await.unwrap_err().is_shut_down());
    assert!(bridge
        .on_message(order_message(1, json!(1)))
        .await
        .unwrap_err()
        .is_shut_down());
}
