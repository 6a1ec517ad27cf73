//! Event fan-out, overflow isolation and heartbeats across live connections.

use super::helpers::{ManualClock, Stack, stack};
use rstest::rstest;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use switchboard::delivery::{
    domain::{ChannelType, HEARTBEAT_EVENT_TYPE, OverflowPolicy, ResourceId, UserId},
    services::{ConnectionRegistry, DeliveryError, EventPublisher, QueueSettings},
};

fn key(channel: &str, resource: &str) -> (ChannelType, ResourceId) {
    (
        ChannelType::new(channel).expect("channel should be valid"),
        ResourceId::new(resource).expect("resource should be valid"),
    )
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn events_reach_every_connection_on_the_exact_stream(stack: Stack) {
    let mut first = stack.subscribe("conversation", "c1");
    let mut second = stack.subscribe("conversation", "c1");
    let mut other_resource = stack.subscribe("conversation", "c2");
    let mut other_channel = stack.subscribe("task", "c1");
    let (channel, resource) = key("conversation", "c1");

    let report = stack
        .publisher
        .send_event(&channel, &resource, "message", json!({ "text": "hi" }))
        .expect("event should publish");

    assert_eq!(report.matched, 2);
    assert_eq!(report.delivered, 2);
    for stream in [&mut first, &mut second] {
        let event = stream.recv().await.expect("event should be delivered");
        assert_eq!(event.event_type(), "message");
        assert_eq!(event.data(), &json!({ "text": "hi" }));
    }
    assert!(other_resource.try_recv().is_none());
    assert!(other_channel.try_recv().is_none());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn slow_connection_loses_only_its_own_oldest_events() {
    let registry = Arc::new(ConnectionRegistry::new(
        QueueSettings {
            capacity: 2,
            overflow_policy: OverflowPolicy::DropOldest,
        },
        Arc::new(ManualClock::default()),
    ));
    let publisher = EventPublisher::new(Arc::clone(&registry), Duration::from_secs(20));
    let (channel, resource) = key("conversation", "c1");
    let user = UserId::new("user-1").expect("user should be valid");
    let (mut fast, _) =
        registry.register_connection(channel.clone(), resource.clone(), user.clone());
    let (mut slow, _) = registry.register_connection(channel.clone(), resource.clone(), user);

    let mut fast_seen = Vec::new();
    for seq in 0..4 {
        publisher
            .send_event(&channel, &resource, "chunk", json!({ "seq": seq }))
            .expect("event should publish");
        fast_seen.extend(fast.drain_ready());
    }

    let slow_seen: Vec<_> = slow
        .drain_ready()
        .iter()
        .map(|event| event.data().get("seq").cloned())
        .collect();
    assert_eq!(fast_seen.len(), 4);
    assert_eq!(fast.dropped_count(), 0);
    assert_eq!(slow_seen, vec![Some(json!(2)), Some(json!(3))]);
    assert_eq!(slow.dropped_count(), 2);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn heartbeat_reaches_idle_connections_until_shutdown(stack: Stack) {
    let mut conversation = stack.subscribe("conversation", "c1");
    let mut task = stack.subscribe("task", "t1");

    assert!(stack.publisher.start_heartbeat());
    assert!(!stack.publisher.start_heartbeat());
    tokio::time::sleep(Duration::from_secs(20) + Duration::from_millis(10)).await;

    for stream in [&mut conversation, &mut task] {
        let event = stream.try_recv().expect("heartbeat should be delivered");
        assert!(event.is_heartbeat());
        assert_eq!(event.event_type(), HEARTBEAT_EVENT_TYPE);
    }

    stack.publisher.shutdown().await;
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert!(!stack.publisher.heartbeat_running());
    assert!(conversation.try_recv().is_none());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn removed_connection_stops_receiving(stack: Stack) {
    let (channel, resource) = key("conversation", "c1");
    let user = UserId::new("user-1").expect("user should be valid");
    let registry = &stack.registry;
    let (mut stream, connection) =
        registry.register_connection(channel.clone(), resource.clone(), user);
    stack
        .publisher
        .send_event(&channel, &resource, "message", json!({}))
        .expect("event should publish");

    assert!(registry.remove_connection(&channel, &resource, connection));
    assert!(!registry.remove_connection(&channel, &resource, connection));
    let report = stack
        .publisher
        .send_event(&channel, &resource, "message", json!({}))
        .expect("event should publish");

    assert_eq!(report.matched, 0);
    assert_eq!(registry.connection_count(), 0);
    assert!(stream.recv().await.is_none());
}

#[rstest]
fn heartbeat_event_type_is_reserved_for_the_publisher(stack: Stack) {
    let (channel, resource) = key("conversation", "c1");

    let result = stack
        .publisher
        .send_event(&channel, &resource, HEARTBEAT_EVENT_TYPE, json!({}));

    assert_eq!(
        result,
        Err(DeliveryError::ReservedEventType(
            HEARTBEAT_EVENT_TYPE.to_owned()
        ))
    );
}
