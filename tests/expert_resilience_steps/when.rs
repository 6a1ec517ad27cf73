//! When steps for domain expert resilience BDD scenarios.

use super::world::{ExpertWorld, run_async};
use chrono::TimeDelta;
use mockable::{Clock, DefaultClock};
use rstest_bdd_macros::when;
use serde_json::json;
use std::sync::Arc;
use switchboard::expert::domain::{ExpertName, Task, TaskConstraints};

#[when(r#"the "{tool}" tool of "{name}" is invoked {times:usize} times"#)]
fn tool_invoked_repeatedly(
    world: &mut ExpertWorld,
    tool: String,
    name: String,
    times: usize,
) -> Result<(), eyre::Report> {
    let hub = Arc::clone(world.hub()?);
    let expert = ExpertName::new(name)?;
    for _ in 0..times {
        let result = run_async(hub.invoke_expert_tool(&expert, &tool, json!({})));
        world.last_call = Some(result);
    }
    Ok(())
}

#[when(r#"a "{task_type}" task is delegated to "{name}""#)]
fn task_delegated(
    world: &mut ExpertWorld,
    task_type: String,
    name: String,
) -> Result<(), eyre::Report> {
    let delegator = world.delegator()?;
    let task = Task::new(task_type, json!({ "diff": "+fn main() {}" }))?;
    world.last_task = Some(run_async(delegator.delegate(&name, task, None)));
    Ok(())
}

#[when(
    r#"a "{task_type}" task with a {millis:u32} millisecond deadline is delegated to "{name}""#
)]
fn task_with_deadline_delegated(
    world: &mut ExpertWorld,
    task_type: String,
    millis: u32,
    name: String,
) -> Result<(), eyre::Report> {
    let delegator = world.delegator()?;
    let deadline = DefaultClock.utc() + TimeDelta::milliseconds(i64::from(millis));
    let task = Task::new(task_type, json!({})).map(|task| {
        task.with_constraints(TaskConstraints {
            deadline: Some(deadline),
            ..TaskConstraints::default()
        })
    })?;
    world.last_task = Some(run_async(delegator.delegate(&name, task, None)));
    Ok(())
}
