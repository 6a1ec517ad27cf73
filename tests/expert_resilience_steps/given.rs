//! Given steps for domain expert resilience BDD scenarios.

use super::world::ExpertWorld;
use rstest_bdd_macros::given;
use serde_json::{Value, json};
use switchboard::expert::{
    adapters::memory::{InMemoryExpertTransport, ToolReply},
    domain::{CANCEL_TASK_TOOL, SUBMIT_TASK_TOOL, TASK_RESULT_TOOL, TASK_STATUS_TOOL},
};

#[given("an expert hub whose breakers open after {threshold:u32} failures")]
fn expert_hub(world: &mut ExpertWorld, threshold: u32) {
    world.build_hub(threshold);
}

#[given(r#"a connected expert "{name}" whose "{tool}" tool fails"#)]
fn expert_with_failing_tool(
    world: &mut ExpertWorld,
    name: String,
    tool: String,
) -> Result<(), eyre::Report> {
    let transport =
        InMemoryExpertTransport::new().with_reply(tool, ToolReply::Fail("tool crashed".to_owned()));
    world.connect_expert(&name, transport)
}

#[given(r#"a connected expert "{name}" that completes tasks with summary "{summary}""#)]
fn expert_completing_tasks(
    world: &mut ExpertWorld,
    name: String,
    summary: String,
) -> Result<(), eyre::Report> {
    let transport = InMemoryExpertTransport::new()
        .with_reply(SUBMIT_TASK_TOOL, ToolReply::Value(Value::Null))
        .with_reply(TASK_STATUS_TOOL, ToolReply::Value(json!({ "status": "completed" })))
        .with_reply(
            TASK_RESULT_TOOL,
            ToolReply::Value(json!({ "success": true, "result": { "summary": summary } })),
        );
    world.connect_expert(&name, transport)
}

#[given(r#"a connected expert "{name}" whose tasks never finish"#)]
fn expert_never_finishing(world: &mut ExpertWorld, name: String) -> Result<(), eyre::Report> {
    let transport = InMemoryExpertTransport::new()
        .with_reply(SUBMIT_TASK_TOOL, ToolReply::Value(Value::Null))
        .with_reply(TASK_STATUS_TOOL, ToolReply::Value(json!({ "status": "running" })))
        .with_reply(CANCEL_TASK_TOOL, ToolReply::Value(Value::Null));
    world.connect_expert(&name, transport)
}
