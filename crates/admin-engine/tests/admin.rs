//! End-to-end scenarios: submissions through the public client against the
//! in-process mock cluster, results observed on the application reply queue.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use weir_admin_core::{
    AdminError, ConfigResource, ConfigSource, ErrorCode, NewTopic, ResourceType,
};
use weir_admin_engine::testing::MockCluster;
use weir_admin_engine::wire::WireWriter;
use weir_admin_engine::{
    event_queue, start_engine, AdminClient, AdminEvent, AdminOp, AdminOptions, ApiKey,
    EngineConfig,
};

fn started_cluster() -> (MockCluster, AdminClient) {
    let cluster = MockCluster::new();
    let client = start_engine(Arc::new(cluster.clone()), EngineConfig::default());
    (cluster, client)
}

/// Encode a topic-mutation response body: optional throttle, then
/// `[topic, error_code, (error_message)]`.
fn topic_reply(throttle: Option<i32>, entries: &[(&str, i16)], with_msg: bool) -> Bytes {
    let mut w = WireWriter::new();
    if let Some(t) = throttle {
        w.put_i32(t);
    }
    w.put_array_len(entries.len());
    for (topic, code) in entries {
        w.put_str(topic);
        w.put_i16(*code);
        if with_msg {
            w.put_nullable_str(None);
        }
    }
    w.finish()
}

#[tokio::test]
async fn happy_create_topics() {
    let (cluster, client) = started_cluster();
    cluster.add_broker(1);
    cluster.set_controller(1);

    let (reply_tx, mut events) = event_queue();
    let mut options = AdminOptions::new(Some(AdminOp::CreateTopics));
    options
        .set_request_timeout(Duration::from_secs(5))
        .unwrap()
        .set_opaque(Arc::new("tag-42".to_string()));

    client
        .create_topics(
            &[NewTopic::new("t1", 3, 1).unwrap()],
            Some(options),
            &reply_tx,
        )
        .unwrap();

    let out = cluster.next_request().await;
    assert_eq!(out.broker_id, 1);
    assert_eq!(out.request.api_key, ApiKey::CreateTopics);
    out.respond_ok(topic_reply(Some(0), &[("t1", 0)], true));

    let event = events.recv().await.unwrap();
    let AdminEvent::CreateTopics(result) = event else {
        panic!("CreateTopics event expected");
    };
    assert!(result.error.is_none());
    assert_eq!(result.topics.len(), 1);
    assert_eq!(result.topics[0].topic, "t1");
    assert_eq!(result.topics[0].error, ErrorCode::None);
    let opaque = result.opaque.expect("opaque echoed");
    assert_eq!(opaque.downcast_ref::<String>().unwrap(), "tag-42");

    assert!(events.try_recv().is_err(), "exactly one event per submission");

    client.request_stop();
    client.wait().await.unwrap();
}

#[tokio::test]
async fn delete_topics_results_come_back_in_submission_order() {
    let (cluster, client) = started_cluster();
    cluster.add_broker(1);
    cluster.set_controller(1);

    let (reply_tx, mut events) = event_queue();
    client
        .delete_topics(&["beta", "alpha", "gamma"], None, &reply_tx)
        .unwrap();

    let out = cluster.next_request().await;
    // DeleteTopics v1 reply, out of order relative to the submission.
    out.respond_ok(topic_reply(
        Some(0),
        &[("gamma", 0), ("alpha", 0), ("beta", 0)],
        false,
    ));

    let AdminEvent::DeleteTopics(result) = events.recv().await.unwrap() else {
        panic!("DeleteTopics event expected");
    };
    let names: Vec<&str> = result.topics.iter().map(|t| t.topic.as_str()).collect();
    assert_eq!(names, ["beta", "alpha", "gamma"]);

    client.request_stop();
    client.wait().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn timeout_while_waiting_for_controller() {
    let (_cluster, client) = started_cluster();
    // Controller never comes up.

    let (reply_tx, mut events) = event_queue();
    let mut options = AdminOptions::new(Some(AdminOp::CreateTopics));
    options
        .set_request_timeout(Duration::from_millis(50))
        .unwrap();

    let submitted_at = tokio::time::Instant::now();
    client
        .create_topics(
            &[NewTopic::new("t1", 1, 1).unwrap()],
            Some(options),
            &reply_tx,
        )
        .unwrap();

    let event = events.recv().await.unwrap();
    assert!(submitted_at.elapsed() <= Duration::from_millis(60));
    match event.error() {
        Some(AdminError::TimedOut(stage)) => assert_eq!(stage, "while waiting for controller"),
        other => panic!("TimedOut expected, got {other:?}"),
    }
    let AdminEvent::CreateTopics(result) = event else {
        panic!("CreateTopics event expected");
    };
    assert!(result.topics.is_empty());

    client.request_stop();
    client.wait().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn zero_request_timeout_times_out_immediately() {
    let (cluster, client) = started_cluster();
    cluster.add_broker(1);
    cluster.set_controller(1);

    let (reply_tx, mut events) = event_queue();
    let mut options = AdminOptions::new(Some(AdminOp::CreateTopics));
    options.set_request_timeout(Duration::ZERO).unwrap();

    client
        .create_topics(
            &[NewTopic::new("t1", 1, 1).unwrap()],
            Some(options),
            &reply_tx,
        )
        .unwrap();

    let event = events.recv().await.unwrap();
    assert!(matches!(event.error(), Some(AdminError::TimedOut(_))));

    client.request_stop();
    client.wait().await.unwrap();
}

#[tokio::test]
async fn alter_configs_with_two_broker_resources_fails_synchronously() {
    let (_cluster, client) = started_cluster();
    let (reply_tx, mut events) = event_queue();

    let resources = vec![
        ConfigResource::new(ResourceType::Broker, "1").unwrap(),
        ConfigResource::new(ResourceType::Broker, "2").unwrap(),
    ];
    let err = client
        .alter_configs(&resources, None, &reply_tx)
        .unwrap_err();
    assert!(matches!(err, AdminError::Conflict(_)));
    assert!(events.try_recv().is_err(), "no event for a rejected submission");

    client.request_stop();
    client.wait().await.unwrap();
}

fn describe_reply_v0(topic: &str) -> Bytes {
    let mut w = WireWriter::new();
    w.put_i32(0); // throttle
    w.put_array_len(1);
    w.put_i16(0);
    w.put_nullable_str(None);
    w.put_i8(ResourceType::Topic.tag());
    w.put_str(topic);
    w.put_array_len(1);
    w.put_str("retention.ms");
    w.put_nullable_str(Some("604800000"));
    w.put_bool(false); // is_read_only
    w.put_bool(true); // is_default
    w.put_bool(false); // is_sensitive
    w.finish()
}

fn describe_reply_v1(topic: &str) -> Bytes {
    let mut w = WireWriter::new();
    w.put_i32(0);
    w.put_array_len(1);
    w.put_i16(0);
    w.put_nullable_str(None);
    w.put_i8(ResourceType::Topic.tag());
    w.put_str(topic);
    w.put_array_len(1);
    w.put_str("retention.ms");
    w.put_nullable_str(Some("604800000"));
    w.put_bool(false); // is_read_only
    w.put_i8(ConfigSource::Default.tag());
    w.put_bool(false); // is_sensitive
    w.put_array_len(0); // synonyms
    w.finish()
}

#[tokio::test]
async fn describe_configs_normalizes_v0_and_v1_default_shapes() {
    let (cluster, client) = started_cluster();
    cluster.add_broker(1);
    cluster.set_controller(1);

    let (reply_tx, mut events) = event_queue();
    let resource = ConfigResource::new(ResourceType::Topic, "t").unwrap();

    // First pass against a v0-only broker.
    cluster.set_api_versions(1, ApiKey::DescribeConfigs, 0, 0);
    client
        .describe_configs(std::slice::from_ref(&resource), None, &reply_tx)
        .unwrap();
    let out = cluster.next_request().await;
    assert_eq!(out.request.api_version, 0);
    out.respond_ok(describe_reply_v0("t"));

    // Second pass after the broker upgraded to v1.
    cluster.set_api_versions(1, ApiKey::DescribeConfigs, 0, 1);
    client
        .describe_configs(&[resource], None, &reply_tx)
        .unwrap();
    let out = cluster.next_request().await;
    assert_eq!(out.request.api_version, 1);
    out.respond_ok(describe_reply_v1("t"));

    for _ in 0..2 {
        let AdminEvent::DescribeConfigs(result) = events.recv().await.unwrap() else {
            panic!("DescribeConfigs event expected");
        };
        assert!(result.error.is_none());
        let entry = &result.resources[0].entries[0];
        assert_eq!(entry.source, ConfigSource::Default);
        assert!(entry.is_default);
    }

    client.request_stop();
    client.wait().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn late_response_after_timeout_is_dropped() {
    let (cluster, client) = started_cluster();
    cluster.add_broker(1);
    cluster.set_controller(1);

    let (reply_tx, mut events) = event_queue();
    let mut options = AdminOptions::new(Some(AdminOp::CreateTopics));
    options
        .set_request_timeout(Duration::from_millis(100))
        .unwrap();

    client
        .create_topics(
            &[NewTopic::new("t1", 1, 1).unwrap()],
            Some(options),
            &reply_tx,
        )
        .unwrap();

    let out = cluster.next_request().await;

    // The deadline passes first; the only event is the timeout.
    let event = events.recv().await.unwrap();
    assert!(matches!(event.error(), Some(AdminError::TimedOut(_))));

    // The broker answers at ~200ms into a dismantled request.
    tokio::time::sleep(Duration::from_millis(100)).await;
    out.respond_ok(topic_reply(Some(0), &[("t1", 0)], true));
    tokio::task::yield_now().await;
    assert!(events.try_recv().is_err(), "late response must be dropped");

    client.request_stop();
    client.wait().await.unwrap();
}

#[tokio::test]
async fn shutdown_discards_outstanding_requests_silently() {
    let (_cluster, client) = started_cluster();
    // No controller: submissions park waiting for one.

    let (reply_tx, mut events) = event_queue();
    for i in 0..3 {
        client
            .create_topics(
                &[NewTopic::new(format!("t{i}"), 1, 1).unwrap()],
                None,
                &reply_tx,
            )
            .unwrap();
    }
    // Let the engine serve and suspend them.
    tokio::task::yield_now().await;

    client.request_stop();
    client.wait().await.unwrap();

    assert!(events.try_recv().is_err(), "no events for destroyed requests");
}

#[tokio::test]
async fn submissions_after_stop_fail_synchronously() {
    let (_cluster, client) = started_cluster();
    let (reply_tx, _events) = event_queue();

    client.request_stop();
    let err = client
        .create_topics(&[NewTopic::new("t", 1, 1).unwrap()], None, &reply_tx)
        .unwrap_err();
    assert!(matches!(err, AdminError::Destroyed));

    client.wait().await.unwrap();
}

#[tokio::test]
async fn explicit_broker_option_bypasses_the_controller() {
    let (cluster, client) = started_cluster();
    // Broker 2 is up but is not the controller; no controller is known.
    cluster.add_broker(2);

    let (reply_tx, mut events) = event_queue();
    let mut options = AdminOptions::new(Some(AdminOp::CreateTopics));
    options.set_broker(2).unwrap();

    client
        .create_topics(
            &[NewTopic::new("t1", 1, 1).unwrap()],
            Some(options),
            &reply_tx,
        )
        .unwrap();

    let out = cluster.next_request().await;
    assert_eq!(out.broker_id, 2);
    out.respond_ok(topic_reply(Some(0), &[("t1", 0)], true));
    assert!(events.recv().await.unwrap().error().is_none());

    client.request_stop();
    client.wait().await.unwrap();
}

#[tokio::test]
async fn broker_config_resource_routes_to_that_broker() {
    let (cluster, client) = started_cluster();
    cluster.add_broker(3);

    let (reply_tx, mut events) = event_queue();
    let resource = ConfigResource::new(ResourceType::Broker, "3").unwrap();
    client
        .describe_configs(&[resource], None, &reply_tx)
        .unwrap();

    let out = cluster.next_request().await;
    assert_eq!(out.broker_id, 3);
    assert_eq!(out.request.api_key, ApiKey::DescribeConfigs);

    let mut w = WireWriter::new();
    w.put_i32(0);
    w.put_array_len(1);
    w.put_i16(0);
    w.put_nullable_str(None);
    w.put_i8(ResourceType::Broker.tag());
    w.put_str("3");
    w.put_array_len(0);
    out.respond_ok(w.finish());

    let AdminEvent::DescribeConfigs(result) = events.recv().await.unwrap() else {
        panic!("DescribeConfigs event expected");
    };
    assert_eq!(result.resources[0].resource_type, ResourceType::Broker);
    assert_eq!(result.resources[0].name, "3");

    client.request_stop();
    client.wait().await.unwrap();
}

#[tokio::test]
async fn resubmitting_an_existing_topic_repeats_the_element_error() {
    let (cluster, client) = started_cluster();
    cluster.add_broker(1);
    cluster.set_controller(1);

    let (reply_tx, mut events) = event_queue();
    let topics = [NewTopic::new("dup", 1, 1).unwrap()];

    for _ in 0..2 {
        client.create_topics(&topics, None, &reply_tx).unwrap();
        let out = cluster.next_request().await;
        out.respond_ok(topic_reply(
            Some(0),
            &[("dup", ErrorCode::TopicAlreadyExists.code())],
            true,
        ));

        let AdminEvent::CreateTopics(result) = events.recv().await.unwrap() else {
            panic!("CreateTopics event expected");
        };
        assert!(result.error.is_none(), "element error, not request error");
        assert_eq!(result.topics[0].error, ErrorCode::TopicAlreadyExists);
    }

    client.request_stop();
    client.wait().await.unwrap();
}

#[tokio::test]
async fn incremental_alter_configs_fails_through_the_event_queue() {
    let (cluster, client) = started_cluster();
    cluster.add_broker(1);
    cluster.set_controller(1);

    let (reply_tx, mut events) = event_queue();
    let mut resource = ConfigResource::new(ResourceType::Topic, "t").unwrap();
    resource.set_config("retention.ms", "100").unwrap();
    let mut options = AdminOptions::new(Some(AdminOp::AlterConfigs));
    options.set_incremental(true).unwrap();

    client
        .alter_configs(&[resource], Some(options), &reply_tx)
        .unwrap();

    let event = events.recv().await.unwrap();
    assert!(matches!(
        event.error(),
        Some(AdminError::UnsupportedFeature(_))
    ));

    client.request_stop();
    client.wait().await.unwrap();
}
