//! Events delivered to subscribed client connections.

use super::{ChannelType, DeliveryDomainError, ResourceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event type reserved for heartbeats generated by the publisher.
pub const HEARTBEAT_EVENT_TYPE: &str = "heartbeat";

/// Ephemeral event addressed to every connection on one resource stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    event_type: String,
    channel_type: ChannelType,
    resource_id: ResourceId,
    data: Value,
    timestamp: DateTime<Utc>,
}

impl Event {
    /// Creates an event.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryDomainError::EmptyEventType`] when the type is
    /// blank.
    pub fn new(
        event_type: impl Into<String>,
        channel_type: ChannelType,
        resource_id: ResourceId,
        data: Value,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, DeliveryDomainError> {
        let normalized = event_type.into().trim().to_owned();
        if normalized.is_empty() {
            return Err(DeliveryDomainError::EmptyEventType);
        }
        Ok(Self {
            event_type: normalized,
            channel_type,
            resource_id,
            data,
            timestamp,
        })
    }

    /// Creates a heartbeat for one stream.
    #[must_use]
    pub fn heartbeat(
        channel_type: ChannelType,
        resource_id: ResourceId,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type: HEARTBEAT_EVENT_TYPE.to_owned(),
            channel_type,
            resource_id,
            data: Value::Object(serde_json::Map::new()),
            timestamp,
        }
    }

    /// Returns the event type.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Returns the channel type.
    #[must_use]
    pub const fn channel_type(&self) -> &ChannelType {
        &self.channel_type
    }

    /// Returns the resource identifier.
    #[must_use]
    pub const fn resource_id(&self) -> &ResourceId {
        &self.resource_id
    }

    /// Returns the payload.
    #[must_use]
    pub const fn data(&self) -> &Value {
        &self.data
    }

    /// Returns when the event was created.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns whether this is a publisher heartbeat.
    #[must_use]
    pub fn is_heartbeat(&self) -> bool {
        self.event_type == HEARTBEAT_EVENT_TYPE
    }
}
