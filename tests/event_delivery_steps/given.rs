//! Given steps for event delivery BDD scenarios.

use super::world::DeliveryWorld;
use rstest_bdd_macros::given;

#[given("connection queues holding {capacity:usize} events")]
fn queues_holding(world: &mut DeliveryWorld, capacity: usize) {
    *world = DeliveryWorld::with_capacity(capacity);
}

#[given(r#"a client "{name}" subscribed to "{channel}" "{resource}""#)]
fn client_subscribed(
    world: &mut DeliveryWorld,
    name: String,
    channel: String,
    resource: String,
) -> Result<(), eyre::Report> {
    world.subscribe(&name, &channel, &resource)
}
