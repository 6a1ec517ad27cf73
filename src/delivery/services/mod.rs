//! Application services for real-time event delivery.

mod publisher;
mod queue;
mod registry;


pub use publisher::{DEFAULT_HEARTBEAT_INTERVAL, DeliveryError, DeliveryReport, EventPublisher};
pub use queue::{DEFAULT_QUEUE_CAPACITY, EnqueueOutcome, EventQueue, EventStream};
pub use registry::{ConnectionRegistry, QueueSettings, Subscriber};
