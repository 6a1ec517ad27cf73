//! Ports for request dispatch.

mod context_store;
mod gateway;
mod handler;
mod sink;

pub use context_store::{ContextStore, ContextStoreError, ContextStoreResult};
pub use gateway::ExpertGateway;
pub use handler::{HandlerError, HandlerResult, RequestHandler};
pub use sink::EventSink;
