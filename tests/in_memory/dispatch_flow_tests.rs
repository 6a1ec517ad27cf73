//! End-to-end request flows through handlers, experts and event streams.

use super::helpers::{ManualClock, SESSION, Stack, expert_name, session_id, stack};
use async_trait::async_trait;
use rstest::rstest;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use switchboard::dispatch::{
    domain::{EntrySource, ErrorKind, InboundRequest, Request, RequestId, ResponseStatus},
    ports::{HandlerError, HandlerResult, RequestHandler},
    services::{CANCELLATION_GRACE, DispatchSettings, HandlerContext},
};
use switchboard::expert::{
    adapters::memory::{InMemoryExpertTransport, ToolReply},
    domain::{
        BreakerSettings, CANCEL_TASK_TOOL, SUBMIT_TASK_TOOL, TASK_RESULT_TOOL, TASK_STATUS_TOOL,
        Task,
    },
    services::{ClientSettings, IntegrationHub},
};

const CODE_EXPERT: &str = "code_analysis";

/// Delegates the request content to the code analysis expert.
struct AnalyseHandler;

#[async_trait]
impl RequestHandler for AnalyseHandler {
    async fn handle(&self, request: &Request, context: HandlerContext) -> HandlerResult<Value> {
        let task = Task::new("analyze_code", request.content().clone())
            .map_err(|err| HandlerError::failed(err.to_string()))?;
        let outcome = context.delegate(CODE_EXPERT, task).await;
        if outcome.success {
            Ok(json!({ "analysis": outcome.result }))
        } else {
            Err(HandlerError::failed(outcome.error.unwrap_or_default()))
        }
    }
}

/// Streams two chunks on the session before answering.
struct ChunkingHandler;

#[async_trait]
impl RequestHandler for ChunkingHandler {
    async fn handle(&self, request: &Request, context: HandlerContext) -> HandlerResult<Value> {
        for chunk in ["Hel", "lo"] {
            context
                .publish(
                    "session",
                    request.session_id().as_str(),
                    "chunk",
                    json!({ "text": chunk }),
                )
                .map_err(HandlerError::runtime)?;
        }
        Ok(json!({ "text": "Hello" }))
    }
}

/// Calls an expert tool directly through the hub.
struct LintHandler {
    hub: Arc<IntegrationHub<ManualClock>>,
}

#[async_trait]
impl RequestHandler for LintHandler {
    async fn handle(&self, request: &Request, _context: HandlerContext) -> HandlerResult<Value> {
        let report = self
            .hub
            .invoke_expert_tool(&expert_name(CODE_EXPERT), "lint", request.content().clone())
            .await?;
        Ok(report)
    }
}

fn analysis_expert() -> InMemoryExpertTransport {
    InMemoryExpertTransport::new()
        .with_reply(SUBMIT_TASK_TOOL, ToolReply::Value(Value::Null))
        .with_reply(
            TASK_STATUS_TOOL,
            ToolReply::Script(
                [
                    Ok(json!({ "status": "running" })),
                    Ok(json!({ "status": "completed" })),
                ]
                .into_iter()
                .collect(),
            ),
        )
        .with_reply(
            TASK_RESULT_TOOL,
            ToolReply::Value(json!({ "success": true, "result": { "issues": 2 } })),
        )
        .with_reply(CANCEL_TASK_TOOL, ToolReply::Value(Value::Null))
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn delegated_request_returns_expert_result_and_records_context(stack: Stack) {
    let expert = analysis_expert();
    stack.start_expert(CODE_EXPERT, &expert).await;
    stack
        .dispatcher
        .register_handler("analyze", Arc::new(AnalyseHandler));
    let mut session_stream = stack.subscribe_session();

    let response = stack
        .dispatcher
        .dispatch(InboundRequest::new("analyze", SESSION, json!({ "path": "src/lib.rs" })))
        .await;

    assert_eq!(response.status(), ResponseStatus::Success);
    assert_eq!(response.content(), &json!({ "analysis": { "issues": 2 } }));
    assert_eq!(expert.invocation_count(SUBMIT_TASK_TOOL), 1);
    assert_eq!(expert.invocation_count(TASK_STATUS_TOOL), 2);
    assert_eq!(expert.invocation_count(TASK_RESULT_TOOL), 1);

    let sources: Vec<EntrySource> = stack
        .store
        .entries(&session_id())
        .into_iter()
        .map(|entry| entry.source)
        .collect();
    assert_eq!(sources, vec![EntrySource::Inbound, EntrySource::Output]);

    let event = session_stream
        .try_recv()
        .expect("response should be streamed to the session");
    assert_eq!(event.event_type(), "response");
    assert_eq!(
        event.data().get("requestId").and_then(Value::as_str),
        Some(response.request_id().as_str())
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn streamed_chunks_precede_the_response(stack: Stack) {
    stack
        .dispatcher
        .register_handler("chat", Arc::new(ChunkingHandler));
    let mut session_stream = stack.subscribe_session();

    let response = stack
        .dispatcher
        .dispatch(InboundRequest::new("chat", SESSION, json!("hi")))
        .await;

    assert_eq!(response.status(), ResponseStatus::Success);
    let kinds: Vec<String> = session_stream
        .drain_ready()
        .iter()
        .map(|event| event.event_type().to_owned())
        .collect();
    assert_eq!(kinds, vec!["chunk", "chunk", "response"]);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn cancelling_a_request_cancels_its_remote_task(stack: Stack) {
    let expert = analysis_expert();
    expert.set_reply(TASK_STATUS_TOOL, ToolReply::Value(json!({ "status": "running" })));
    stack.start_expert(CODE_EXPERT, &expert).await;
    stack
        .dispatcher
        .register_handler("analyze", Arc::new(AnalyseHandler));
    let dispatcher = Arc::clone(&stack.dispatcher);
    let pending = tokio::spawn(async move {
        dispatcher
            .dispatch(InboundRequest::new("analyze", SESSION, json!({})).with_id("req-7"))
            .await
    });
    tokio::time::sleep(Duration::from_millis(2_500)).await;

    let request_id = RequestId::new("req-7").expect("request id should be valid");
    assert!(stack.dispatcher.cancel_request(&request_id));
    let response = pending.await.expect("dispatch task should finish");
    tokio::time::sleep(CANCELLATION_GRACE + Duration::from_millis(10)).await;

    assert_eq!(response.error_kind(), Some(ErrorKind::Cancelled));
    assert!(!stack.dispatcher.is_in_flight(&request_id));
    assert_eq!(expert.invocation_count(CANCEL_TASK_TOOL), 1);
    assert_eq!(expert.invocation_count(TASK_RESULT_TOOL), 0);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn failing_expert_trips_breaker_and_reports_circuit_open() {
    let client = ClientSettings {
        breaker: BreakerSettings {
            failure_threshold: 2,
            ..BreakerSettings::default()
        },
        ..ClientSettings::default()
    };
    let stack = Stack::with_settings(client, DispatchSettings::default());
    let expert = InMemoryExpertTransport::new()
        .with_reply("lint", ToolReply::Fail("linter crashed".to_owned()));
    stack.start_expert(CODE_EXPERT, &expert).await;
    stack.dispatcher.register_handler(
        "lint",
        Arc::new(LintHandler {
            hub: Arc::clone(&stack.hub),
        }),
    );

    let mut kinds = Vec::new();
    for _ in 0..3 {
        let response = stack
            .dispatcher
            .dispatch(InboundRequest::new("lint", SESSION, json!({})))
            .await;
        kinds.push(response.error_kind());
    }

    assert_eq!(
        kinds,
        vec![
            Some(ErrorKind::HandlerExecution),
            Some(ErrorKind::HandlerExecution),
            Some(ErrorKind::CircuitOpen),
        ]
    );
    assert_eq!(expert.invocation_count("lint"), 2);
}

#[rstest]
#[case::unknown_type(InboundRequest::new("translate", SESSION, json!({})))]
#[case::unknown_session(InboundRequest::new("chat", "session-404", json!({})))]
#[case::blank_type(InboundRequest::new("  ", SESSION, json!({})))]
#[tokio::test(start_paused = true)]
async fn rejected_requests_answer_with_validation_errors(
    stack: Stack,
    #[case] inbound: InboundRequest,
) {
    stack
        .dispatcher
        .register_handler("chat", Arc::new(ChunkingHandler));

    let response = stack.dispatcher.dispatch(inbound).await;

    assert_eq!(response.status(), ResponseStatus::Error);
    assert_eq!(response.error_kind(), Some(ErrorKind::Validation));
    assert!(stack.store.entries(&session_id()).is_empty());
    assert_eq!(stack.dispatcher.in_flight_count(), 0);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn delegation_to_unregistered_expert_fails_fast(stack: Stack) {
    stack
        .dispatcher
        .register_handler("analyze", Arc::new(AnalyseHandler));

    let response = stack
        .dispatcher
        .dispatch(InboundRequest::new("analyze", SESSION, json!({})))
        .await;

    assert_eq!(response.error_kind(), Some(ErrorKind::HandlerExecution));
    assert_eq!(
        response.error_message(),
        Some(format!("unknown expert: {CODE_EXPERT}").as_str())
    );
}
