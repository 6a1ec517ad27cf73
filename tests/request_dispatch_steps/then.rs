//! Then steps for request dispatch BDD scenarios.

use super::world::DispatchWorld;
use rstest_bdd_macros::then;
use serde_json::Value;
use switchboard::dispatch::domain::Response;

fn last_response(world: &DispatchWorld) -> Result<&Response, eyre::Report> {
    world
        .last_response
        .as_ref()
        .ok_or_else(|| eyre::eyre!("no response recorded in scenario world"))
}

#[then(r#"the response status is "{status}""#)]
fn response_status_is(world: &DispatchWorld, status: String) -> Result<(), eyre::Report> {
    let response = last_response(world)?;
    eyre::ensure!(
        response.status().as_str() == status,
        "expected status {status}, got {}",
        response.status().as_str()
    );
    Ok(())
}

#[then(r#"the response content is "{content}""#)]
fn response_content_is(world: &DispatchWorld, content: String) -> Result<(), eyre::Report> {
    let response = last_response(world)?;
    eyre::ensure!(
        response.content().as_str() == Some(content.as_str()),
        "expected content {content}, got {}",
        response.content()
    );
    Ok(())
}

#[then(r#"the response error kind is "{kind}""#)]
fn response_error_kind_is(world: &DispatchWorld, kind: String) -> Result<(), eyre::Report> {
    let response = last_response(world)?;
    let actual = response.error_kind().map(|found| found.as_str());
    eyre::ensure!(
        actual == Some(kind.as_str()),
        "expected error kind {kind}, got {actual:?}"
    );
    Ok(())
}

#[then("the session stream received the response")]
fn session_stream_received_response(world: &mut DispatchWorld) -> Result<(), eyre::Report> {
    let expected = last_response(world)?.request_id().as_str().to_owned();
    let stream = world
        .session_stream
        .as_mut()
        .ok_or_else(|| eyre::eyre!("no client subscribed to the session"))?;
    let event = stream
        .try_recv()
        .ok_or_else(|| eyre::eyre!("session stream is empty"))?;
    let streamed = event.data().get("requestId").and_then(Value::as_str);
    eyre::ensure!(
        event.event_type() == "response" && streamed == Some(expected.as_str()),
        "unexpected event {} for request {streamed:?}",
        event.event_type()
    );
    Ok(())
}

#[then("no request is in flight")]
fn no_request_in_flight(world: &DispatchWorld) -> Result<(), eyre::Report> {
    let count = world.dispatcher.in_flight_count();
    eyre::ensure!(count == 0, "expected no in-flight requests, found {count}");
    Ok(())
}
