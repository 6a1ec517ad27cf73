//! Connection registry: subscriptions keyed by `(channel type, resource)`.

use super::queue::{DEFAULT_QUEUE_CAPACITY, EventQueue, EventStream};
use crate::delivery::domain::{
    ChannelType, ConnectionId, OverflowPolicy, ResourceId, Subscription, SubscriptionKey, UserId,
};
use dashmap::DashMap;
use mockable::Clock;
use std::sync::Arc;

/// Queue sizing for new connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSettings {
    /// Pending events kept per connection.
    pub capacity: usize,
    /// What to lose when a queue is full.
    pub overflow_policy: OverflowPolicy,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            overflow_policy: OverflowPolicy::DropOldest,
        }
    }
}

/// Live subscriber of one stream, as seen by the publisher.
#[derive(Debug, Clone)]
pub struct Subscriber {
    /// Connection identifier.
    pub connection_id: ConnectionId,
    /// Queue owned by the connection.
    pub queue: Arc<EventQueue>,
}

/// Registry of live client connections.
///
/// Subscriptions sit in a sharded multimap keyed by exact
/// `(channel type, resource)`; each connection's queue sits in a side table
/// keyed by [`ConnectionId`]. Neither map's lock is held while the other is
/// touched.
pub struct ConnectionRegistry<C>
where
    C: Clock + Send + Sync,
{
    subscriptions: DashMap<SubscriptionKey, Vec<Subscription>>,
    queues: DashMap<ConnectionId, Arc<EventQueue>>,
    settings: QueueSettings,
    clock: Arc<C>,
}

impl<C> ConnectionRegistry<C>
where
    C: Clock + Send + Sync,
{
    /// Creates an empty registry.
    #[must_use]
    pub fn new(settings: QueueSettings, clock: Arc<C>) -> Self {
        Self {
            subscriptions: DashMap::new(),
            queues: DashMap::new(),
            settings,
            clock,
        }
    }

    /// Subscribes a new connection and returns its event stream.
    ///
    /// The caller owns the stream and is its only reader.
    pub fn register_connection(
        &self,
        channel_type: ChannelType,
        resource_id: ResourceId,
        user_id: UserId,
    ) -> (EventStream, ConnectionId) {
        let connection_id = ConnectionId::new();
        let queue = Arc::new(EventQueue::new(
            self.settings.capacity,
            self.settings.overflow_policy,
        ));
        let key = SubscriptionKey::new(channel_type, resource_id);
        let subscription = Subscription::new(connection_id, key.clone(), user_id, self.clock.utc());

        self.queues.insert(connection_id, Arc::clone(&queue));
        self.subscriptions
            .entry(key.clone())
            .or_default()
            .push(subscription);

        tracing::debug!(
            connection_id = %connection_id,
            channel_type = %key.channel_type,
            resource_id = %key.resource_id,
            "connection registered"
        );
        (EventStream::new(connection_id, queue), connection_id)
    }

    /// Removes a connection and discards its queue.
    ///
    /// Safe to call repeatedly; returns whether anything was removed.
    pub fn remove_connection(
        &self,
        channel_type: &ChannelType,
        resource_id: &ResourceId,
        connection_id: ConnectionId,
    ) -> bool {
        let key = SubscriptionKey::new(channel_type.clone(), resource_id.clone());
        let removed_subscription = self
            .subscriptions
            .get_mut(&key)
            .is_some_and(|mut entry| {
                let before = entry.len();
                entry.retain(|subscription| subscription.connection_id() != connection_id);
                entry.len() != before
            });
        self.subscriptions
            .remove_if(&key, |_, remaining| remaining.is_empty());

        if !removed_subscription {
            return false;
        }
        if let Some((_, queue)) = self.queues.remove(&connection_id) {
            queue.close();
        }
        tracing::debug!(connection_id = %connection_id, "connection removed");
        true
    }

    /// Returns the live subscribers of one stream.
    #[must_use]
    pub fn subscribers(
        &self,
        channel_type: &ChannelType,
        resource_id: &ResourceId,
    ) -> Vec<Subscriber> {
        let key = SubscriptionKey::new(channel_type.clone(), resource_id.clone());
        let connection_ids: Vec<ConnectionId> = self
            .subscriptions
            .get(&key)
            .map(|entry| entry.iter().map(Subscription::connection_id).collect())
            .unwrap_or_default();
        self.resolve_queues(connection_ids)
    }

    /// Returns every live subscription with its queue.
    #[must_use]
    pub fn all_subscribers(&self) -> Vec<(SubscriptionKey, Subscriber)> {
        let entries: Vec<(SubscriptionKey, ConnectionId)> = self
            .subscriptions
            .iter()
            .flat_map(|entry| {
                let key = entry.key().clone();
                entry
                    .value()
                    .iter()
                    .map(|subscription| (key.clone(), subscription.connection_id()))
                    .collect::<Vec<_>>()
            })
            .collect();

        entries
            .into_iter()
            .filter_map(|(key, connection_id)| {
                self.queues.get(&connection_id).map(|queue| {
                    (
                        key,
                        Subscriber {
                            connection_id,
                            queue: Arc::clone(queue.value()),
                        },
                    )
                })
            })
            .collect()
    }

    /// Returns the subscription record of a connection.
    #[must_use]
    pub fn subscription(
        &self,
        channel_type: &ChannelType,
        resource_id: &ResourceId,
        connection_id: ConnectionId,
    ) -> Option<Subscription> {
        let key = SubscriptionKey::new(channel_type.clone(), resource_id.clone());
        self.subscriptions.get(&key).and_then(|entry| {
            entry
                .iter()
                .find(|subscription| subscription.connection_id() == connection_id)
                .cloned()
        })
    }

    /// Returns the number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.queues.len()
    }

    /// Returns the queue settings applied to new connections.
    #[must_use]
    pub const fn queue_settings(&self) -> QueueSettings {
        self.settings
    }

    pub(super) fn clock(&self) -> &C {
        &self.clock
    }

    fn resolve_queues(&self, connection_ids: Vec<ConnectionId>) -> Vec<Subscriber> {
        connection_ids
            .into_iter()
            .filter_map(|connection_id| {
                self.queues.get(&connection_id).map(|queue| Subscriber {
                    connection_id,
                    queue: Arc::clone(queue.value()),
                })
            })
            .collect()
    }
}
