//! Event sink port used to push responses and handler events to clients.

use crate::delivery::services::{DeliveryError, DeliveryReport};
use serde_json::Value;

/// Publishes events to subscribers of a `(channel type, resource)` key.
pub trait EventSink: Send + Sync {
    /// Publishes one event.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] when the key or event type is rejected.
    fn publish(
        &self,
        channel_type: &str,
        resource_id: &str,
        event_type: &str,
        data: Value,
    ) -> Result<DeliveryReport, DeliveryError>;
}
