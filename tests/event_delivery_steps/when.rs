//! When steps for event delivery BDD scenarios.

use super::world::DeliveryWorld;
use rstest_bdd_macros::when;
use serde_json::json;

#[when(r#"a "{event_type}" event is published to "{channel}" "{resource}""#)]
fn event_published(
    world: &mut DeliveryWorld,
    event_type: String,
    channel: String,
    resource: String,
) -> Result<(), eyre::Report> {
    world.publish(&event_type, &channel, &resource, json!({ "text": "hello" }))
}

#[when(
    r#"client "{name}" reads each of {count:usize} "{event_type}" events published to "{channel}" "{resource}""#
)]
fn client_keeps_up(
    world: &mut DeliveryWorld,
    name: String,
    count: usize,
    event_type: String,
    channel: String,
    resource: String,
) -> Result<(), eyre::Report> {
    for seq in 0..count {
        world.publish(&event_type, &channel, &resource, json!({ "seq": seq }))?;
        let received = world.client(&name)?.drain_ready();
        eyre::ensure!(received.len() == 1, "client {name} missed event {seq}");
    }
    Ok(())
}
