//! Then steps for domain expert resilience BDD scenarios.

use super::world::{ExpertWorld, run_async};
use rstest_bdd_macros::then;
use serde_json::json;
use std::time::Duration;
use switchboard::expert::{
    domain::TaskResult,
    services::{ExpertClientError, HubError},
};

fn last_task(world: &ExpertWorld) -> Result<&TaskResult, eyre::Report> {
    world
        .last_task
        .as_ref()
        .ok_or_else(|| eyre::eyre!("no task result in scenario world"))
}

#[then("the last call is refused by the open circuit")]
fn last_call_refused(world: &ExpertWorld) -> Result<(), eyre::Report> {
    let result = world
        .last_call
        .as_ref()
        .ok_or_else(|| eyre::eyre!("no tool call in scenario world"))?;
    eyre::ensure!(
        matches!(
            result,
            Err(HubError::Client(ExpertClientError::CircuitOpen(_)))
        ),
        "expected an open circuit, got {result:?}"
    );
    Ok(())
}

#[then(r#"the expert "{name}" received {count:usize} "{tool}" invocations"#)]
fn expert_received_invocations(
    world: &ExpertWorld,
    name: String,
    count: usize,
    tool: String,
) -> Result<(), eyre::Report> {
    let expert = world.expert(&name)?;
    let observed = run_async(async {
        for _ in 0..50 {
            if expert.invocation_count(&tool) >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        expert.invocation_count(&tool)
    });
    eyre::ensure!(
        observed == count,
        "expected {count} {tool} invocations, observed {observed}"
    );
    Ok(())
}

#[then(r#"the task succeeds with summary "{summary}""#)]
fn task_succeeds(world: &ExpertWorld, summary: String) -> Result<(), eyre::Report> {
    let result = last_task(world)?;
    eyre::ensure!(result.success, "task failed: {:?}", result.error);
    eyre::ensure!(
        result.result == Some(json!({ "summary": summary })),
        "unexpected task result {:?}",
        result.result
    );
    Ok(())
}

#[then("the task fails with a timeout")]
fn task_times_out(world: &ExpertWorld) -> Result<(), eyre::Report> {
    let result = last_task(world)?;
    eyre::ensure!(
        !result.success && result.is_timeout(),
        "expected a timeout, got {result:?}"
    );
    Ok(())
}
