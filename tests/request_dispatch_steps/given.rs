//! Given steps for request dispatch BDD scenarios.

use super::world::{DispatchWorld, EchoHandler, SlowHandler};
use rstest_bdd_macros::given;
use std::sync::Arc;
use switchboard::dispatch::ports::RequestHandler;

#[given(r#"a handler registered for "{request_type}" requests"#)]
fn handler_registered(world: &mut DispatchWorld, request_type: String) {
    let handler: Arc<dyn RequestHandler> = if request_type == "slow" {
        Arc::new(SlowHandler)
    } else {
        Arc::new(EchoHandler)
    };
    world.dispatcher.register_handler(request_type, handler);
}

#[given("a client subscribed to its session")]
fn client_subscribed(world: &mut DispatchWorld) {
    world.subscribe_session();
}
