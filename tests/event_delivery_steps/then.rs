//! Then steps for event delivery BDD scenarios.

use super::world::DeliveryWorld;
use rstest_bdd_macros::then;
use switchboard::delivery::services::DeliveryError;

#[then(r#"client "{name}" received a "{event_type}" event"#)]
fn client_received(
    world: &mut DeliveryWorld,
    name: String,
    event_type: String,
) -> Result<(), eyre::Report> {
    let event = world
        .client(&name)?
        .try_recv()
        .ok_or_else(|| eyre::eyre!("client {name} received nothing"))?;
    eyre::ensure!(
        event.event_type() == event_type,
        "client {name} received {} instead of {event_type}",
        event.event_type()
    );
    Ok(())
}

#[then(r#"client "{name}" received nothing"#)]
fn client_received_nothing(world: &mut DeliveryWorld, name: String) -> Result<(), eyre::Report> {
    let pending = world.client(&name)?.drain_ready();
    eyre::ensure!(
        pending.is_empty(),
        "client {name} unexpectedly received {} events",
        pending.len()
    );
    Ok(())
}

#[then(r#"client "{name}" lost {count:u64} events"#)]
fn client_lost(world: &mut DeliveryWorld, name: String, count: u64) -> Result<(), eyre::Report> {
    let dropped = world.client(&name)?.dropped_count();
    eyre::ensure!(
        dropped == count,
        "client {name} lost {dropped} events, expected {count}"
    );
    Ok(())
}

#[then("publishing is rejected as reserved")]
fn publishing_rejected(world: &DeliveryWorld) -> Result<(), eyre::Report> {
    let result = world
        .last_publish
        .as_ref()
        .ok_or_else(|| eyre::eyre!("nothing was published in scenario world"))?;
    eyre::ensure!(
        matches!(result, Err(DeliveryError::ReservedEventType(_))),
        "expected a reserved event type error, got {result:?}"
    );
    Ok(())
}
