//! Immutable subscription records held by the connection registry.

use super::{ChannelType, ConnectionId, DeliveryDomainError, ResourceId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Exact `(channel type, resource)` key a connection subscribes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionKey {
    /// Channel type.
    pub channel_type: ChannelType,
    /// Resource identifier.
    pub resource_id: ResourceId,
}

impl SubscriptionKey {
    /// Creates a key.
    #[must_use]
    pub const fn new(channel_type: ChannelType, resource_id: ResourceId) -> Self {
        Self {
            channel_type,
            resource_id,
        }
    }
}

/// Overflow behaviour of a full connection queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest queued event to make room.
    #[default]
    DropOldest,
    /// Discard the incoming event.
    DropNewest,
}

impl OverflowPolicy {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DropOldest => "drop_oldest",
            Self::DropNewest => "drop_newest",
        }
    }
}

impl TryFrom<&str> for OverflowPolicy {
    type Error = DeliveryDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "drop_oldest" => Ok(Self::DropOldest),
            "drop_newest" => Ok(Self::DropNewest),
            _ => Err(DeliveryDomainError::UnknownOverflowPolicy(value.to_owned())),
        }
    }
}

impl FromStr for OverflowPolicy {
    type Err = DeliveryDomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::try_from(value)
    }
}

/// One client connection's subscription.
///
/// The record never changes after registration; its queue lives in a
/// separate table keyed by [`ConnectionId`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    connection_id: ConnectionId,
    key: SubscriptionKey,
    user_id: UserId,
    subscribed_at: DateTime<Utc>,
}

impl Subscription {
    /// Creates a subscription record.
    #[must_use]
    pub const fn new(
        connection_id: ConnectionId,
        key: SubscriptionKey,
        user_id: UserId,
        subscribed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            connection_id,
            key,
            user_id,
            subscribed_at,
        }
    }

    /// Returns the connection identifier.
    #[must_use]
    pub const fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Returns the subscription key.
    #[must_use]
    pub const fn key(&self) -> &SubscriptionKey {
        &self.key
    }

    /// Returns the subscribed user.
    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Returns when the connection subscribed.
    #[must_use]
    pub const fn subscribed_at(&self) -> DateTime<Utc> {
        self.subscribed_at
    }
}
