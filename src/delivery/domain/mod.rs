//! Domain model for real-time event delivery.
//!
//! Subscriptions are immutable records keyed by exact
//! `(channel type, resource)` pairs; events are ephemeral and never stored.

mod error;
mod event;
mod ids;
mod subscription;

pub use error::DeliveryDomainError;
pub use event::{Event, HEARTBEAT_EVENT_TYPE};
pub use ids::{ChannelType, ConnectionId, ResourceId, UserId};
pub use subscription::{OverflowPolicy, Subscription, SubscriptionKey};
