//! Shared world state for event delivery BDD scenarios.

use mockable::DefaultClock;
use rstest::fixture;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use switchboard::delivery::{
    domain::{ChannelType, OverflowPolicy, ResourceId, UserId},
    services::{
        ConnectionRegistry, DeliveryError, DeliveryReport, EventPublisher, EventStream,
        QueueSettings,
    },
};

/// Publisher type used by the BDD world.
pub type TestPublisher = EventPublisher<DefaultClock>;

/// Scenario world for event delivery behaviour tests.
pub struct DeliveryWorld {
    /// Publisher under test.
    pub publisher: TestPublisher,
    /// Streams of subscribed clients, by client name.
    pub clients: HashMap<String, EventStream>,
    /// Result of the last publish.
    pub last_publish: Option<Result<DeliveryReport, DeliveryError>>,
}

impl DeliveryWorld {
    /// Creates a world with default queue settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(QueueSettings::default().capacity)
    }

    /// Creates a world whose queues hold `capacity` events.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(
            QueueSettings {
                capacity,
                overflow_policy: OverflowPolicy::DropOldest,
            },
            Arc::new(DefaultClock),
        ));
        Self {
            publisher: EventPublisher::new(registry, Duration::from_secs(20)),
            clients: HashMap::new(),
            last_publish: None,
        }
    }

    /// Subscribes client `name` to a stream.
    ///
    /// # Errors
    ///
    /// Returns an error when the key or user is invalid.
    pub fn subscribe(
        &mut self,
        name: &str,
        channel: &str,
        resource: &str,
    ) -> Result<(), eyre::Report> {
        let (stream, _connection) = self.publisher.registry().register_connection(
            ChannelType::new(channel)?,
            ResourceId::new(resource)?,
            UserId::new(name)?,
        );
        self.clients.insert(name.to_owned(), stream);
        Ok(())
    }

    /// Returns the stream of client `name`.
    ///
    /// # Errors
    ///
    /// Returns an error when no client is subscribed under `name`.
    pub fn client(&mut self, name: &str) -> Result<&mut EventStream, eyre::Report> {
        self.clients
            .get_mut(name)
            .ok_or_else(|| eyre::eyre!("no client named '{name}' in scenario world"))
    }

    /// Publishes an event and records the outcome.
    ///
    /// # Errors
    ///
    /// Returns an error when the key is invalid.
    pub fn publish(
        &mut self,
        event_type: &str,
        channel: &str,
        resource: &str,
        data: serde_json::Value,
    ) -> Result<(), eyre::Report> {
        let result = self.publisher.send_event(
            &ChannelType::new(channel)?,
            &ResourceId::new(resource)?,
            event_type,
            data,
        );
        self.last_publish = Some(result);
        Ok(())
    }
}

impl Default for DeliveryWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> DeliveryWorld {
    DeliveryWorld::default()
}
