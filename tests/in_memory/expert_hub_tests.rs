//! Integration hub behaviour against in-memory experts.

use super::helpers::{Stack, endpoint, expert_name, settle, stack};
use rstest::rstest;
use serde_json::json;
use std::time::Duration;
use switchboard::dispatch::services::DispatchSettings;
use switchboard::expert::{
    adapters::memory::{InMemoryExpertTransport, StaticEndpointSource, ToolReply},
    domain::{BreakerSettings, CircuitState, ExpertStatus, ResourceContent, ToolDefinition},
    services::{ClientSettings, ExpertClientError, HubError},
};

fn status_of(stack: &Stack, name: &str) -> Option<ExpertStatus> {
    stack
        .hub
        .describe_experts()
        .into_iter()
        .find(|descriptor| descriptor.name == expert_name(name))
        .map(|descriptor| descriptor.status)
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn startup_keeps_unreachable_experts_registered(stack: Stack) {
    let code = InMemoryExpertTransport::new();
    let search = InMemoryExpertTransport::new();
    search.make_unreachable("connection refused");
    stack.factory.insert(expert_name("code"), code.clone());
    stack.factory.insert(expert_name("search"), search);

    let registered = stack.hub.startup(vec![endpoint("code"), endpoint("search")]);
    settle().await;

    assert_eq!(registered, vec![expert_name("code"), expert_name("search")]);
    assert_eq!(status_of(&stack, "code"), Some(ExpertStatus::Connected));
    assert_eq!(status_of(&stack, "search"), Some(ExpertStatus::Disconnected));
    assert!(code.is_connected());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn open_breaker_recovers_after_cool_down() {
    let client = ClientSettings {
        breaker: BreakerSettings {
            failure_threshold: 2,
            cool_down: Duration::from_secs(30),
            ..BreakerSettings::default()
        },
        ..ClientSettings::default()
    };
    let stack = Stack::with_settings(client, DispatchSettings::default());
    let expert = InMemoryExpertTransport::new()
        .with_reply("lint", ToolReply::Fail("linter crashed".to_owned()));
    stack.start_expert("code", &expert).await;
    let code = expert_name("code");

    for _ in 0..2 {
        let failure = stack.hub.invoke_expert_tool(&code, "lint", json!({})).await;
        assert!(failure.is_err());
    }
    let refused = stack.hub.invoke_expert_tool(&code, "lint", json!({})).await;
    assert!(matches!(
        refused,
        Err(HubError::Client(ExpertClientError::CircuitOpen(_)))
    ));
    assert_eq!(expert.invocation_count("lint"), 2);
    assert_eq!(status_of(&stack, "code"), Some(ExpertStatus::Degraded));

    expert.set_reply("lint", ToolReply::Value(json!({ "issues": [] })));
    stack.clock.advance(Duration::from_secs(31));
    let recovered = stack
        .hub
        .invoke_expert_tool(&code, "lint", json!({}))
        .await
        .expect("trial call should succeed");

    assert_eq!(recovered, json!({ "issues": [] }));
    let breaker = stack.hub.client(&code).map(|client| client.breaker_state());
    assert_eq!(breaker, Some(CircuitState::Closed));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn reload_registers_only_new_endpoints(stack: Stack) {
    for name in ["code", "search"] {
        stack
            .factory
            .insert(expert_name(name), InMemoryExpertTransport::new());
    }
    stack.hub.startup(vec![endpoint("code")]);
    let source = StaticEndpointSource::new(vec![endpoint("code")]);
    source.push(endpoint("search"));

    let added = stack
        .hub
        .reload_from(&source)
        .await
        .expect("reload should succeed");
    let repeated = stack
        .hub
        .reload_from(&source)
        .await
        .expect("second reload should succeed");

    assert_eq!(added, vec![expert_name("search")]);
    assert!(repeated.is_empty());
    assert_eq!(
        stack.hub.list_experts(),
        vec![expert_name("code"), expert_name("search")]
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn deregistered_expert_is_closed_and_unknown(stack: Stack) {
    let expert = InMemoryExpertTransport::new();
    stack.start_expert("code", &expert).await;
    let code = expert_name("code");

    stack
        .hub
        .deregister_expert(&code)
        .await
        .expect("deregistration should succeed");
    let result = stack.hub.invoke_expert_tool(&code, "lint", json!({})).await;

    assert!(matches!(result, Err(HubError::UnknownExpert(name)) if name == code));
    assert_eq!(expert.calls().closes, 1);
    assert_eq!(expert.calls().invocations, 0);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn tools_and_resources_are_exposed_by_name(stack: Stack) {
    let tool = ToolDefinition::new("lint", "Lint a file", json!({ "type": "object" }))
        .expect("tool should be valid");
    let expert = InMemoryExpertTransport::new()
        .with_tools(vec![tool.clone()])
        .with_resource(
            ResourceContent::new("docs://style", json!("use four spaces"))
                .with_mime_type("text/plain"),
        );
    stack.start_expert("code", &expert).await;
    let code = expert_name("code");

    let listing = stack
        .hub
        .list_expert_tools(&code)
        .await
        .expect("listing should succeed");
    let resource = stack
        .hub
        .read_expert_resource(&code, "docs://style")
        .await
        .expect("resource should be readable");

    assert_eq!(listing.tools, vec![tool]);
    assert!(!listing.is_degraded());
    assert_eq!(resource.content, json!("use four spaces"));
    assert_eq!(resource.mime_type.as_deref(), Some("text/plain"));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn unreachable_expert_degrades_tool_listing(stack: Stack) {
    let expert = InMemoryExpertTransport::new();
    expert.make_unreachable("connection refused");
    stack.start_expert("code", &expert).await;

    let listing = stack
        .hub
        .list_expert_tools(&expert_name("code"))
        .await
        .expect("listing should not fail outright");

    assert!(listing.is_degraded());
    assert!(listing.tools.is_empty());
}
