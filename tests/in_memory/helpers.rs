//! Shared helpers for in-memory integration tests.

use chrono::{DateTime, Local, TimeZone, Utc};
use mockable::Clock;
use rstest::fixture;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use switchboard::delivery::{
    domain::{ChannelType, ResourceId, UserId},
    services::{ConnectionRegistry, EventPublisher, EventStream, QueueSettings},
};
use switchboard::dispatch::{
    adapters::memory::InMemoryContextStore,
    domain::SessionId,
    ports::{EventSink, ExpertGateway},
    services::{DispatchSettings, Dispatcher},
};
use switchboard::expert::{
    adapters::memory::{InMemoryExpertTransport, InMemoryTransportFactory},
    domain::{ExpertEndpoint, ExpertName},
    ports::TransportFactory,
    services::{ClientSettings, IntegrationHub},
};

/// Session opened by [`Stack::new`].
pub const SESSION: &str = "session-1";

/// Clock that only moves when a test advances it.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Moves the clock forward.
    ///
    /// # Panics
    ///
    /// Panics when `step` does not fit a chrono duration.
    pub fn advance(&self, step: Duration) {
        let delta = chrono::Duration::from_std(step).expect("test step should fit");
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) += delta;
    }

    /// Returns the current instant.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        let start = Utc
            .with_ymd_and_hms(2026, 3, 2, 8, 30, 0)
            .single()
            .expect("fixed start should be valid");
        Self {
            now: Mutex::new(start),
        }
    }
}

impl Clock for ManualClock {
    fn local(&self) -> DateTime<Local> {
        self.now().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.now()
    }
}

/// Dispatcher type used by the integration tests.
pub type TestDispatcher = Dispatcher<InMemoryContextStore, ManualClock>;

/// Fully wired in-memory switchboard.
pub struct Stack {
    /// Shared test clock.
    pub clock: Arc<ManualClock>,
    /// Transports handed out by expert name.
    pub factory: Arc<InMemoryTransportFactory>,
    /// Hub owning the expert clients.
    pub hub: Arc<IntegrationHub<ManualClock>>,
    /// Connection registry behind the publisher.
    pub registry: Arc<ConnectionRegistry<ManualClock>>,
    /// Publisher used as the dispatcher's event sink.
    pub publisher: Arc<EventPublisher<ManualClock>>,
    /// Context store with [`SESSION`] opened.
    pub store: Arc<InMemoryContextStore>,
    /// Dispatcher under test.
    pub dispatcher: Arc<TestDispatcher>,
}

impl Stack {
    /// Wires a stack with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(ClientSettings::default(), DispatchSettings::default())
    }

    /// Wires a stack with explicit client and dispatch settings.
    #[must_use]
    pub fn with_settings(client: ClientSettings, dispatch: DispatchSettings) -> Self {
        let clock = Arc::new(ManualClock::default());
        let factory = Arc::new(InMemoryTransportFactory::new());
        let hub = Arc::new(IntegrationHub::new(
            Arc::clone(&factory) as Arc<dyn TransportFactory>,
            Arc::clone(&clock),
            client,
        ));
        let registry = Arc::new(ConnectionRegistry::new(
            QueueSettings::default(),
            Arc::clone(&clock),
        ));
        let publisher = Arc::new(EventPublisher::new(
            Arc::clone(&registry),
            Duration::from_secs(20),
        ));
        let store = Arc::new(InMemoryContextStore::new());
        store.open_session(session_id(), clock.now());
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&store),
            Arc::clone(&hub) as Arc<dyn ExpertGateway>,
            Arc::clone(&publisher) as Arc<dyn EventSink>,
            Arc::clone(&clock),
            dispatch,
        ));
        Self {
            clock,
            factory,
            hub,
            registry,
            publisher,
            store,
            dispatcher,
        }
    }

    /// Registers an expert transport and starts the hub with it.
    pub async fn start_expert(&self, name: &str, transport: &InMemoryExpertTransport) {
        self.factory.insert(expert_name(name), transport.clone());
        self.hub.startup(vec![endpoint(name)]);
        settle().await;
    }

    /// Subscribes a client to the session channel.
    #[must_use]
    pub fn subscribe_session(&self) -> EventStream {
        self.subscribe("session", SESSION)
    }

    /// Subscribes a client to an arbitrary stream.
    ///
    /// # Panics
    ///
    /// Panics when the channel or resource is blank.
    #[must_use]
    pub fn subscribe(&self, channel: &str, resource: &str) -> EventStream {
        let (stream, _connection) = self.registry.register_connection(
            ChannelType::new(channel).expect("channel should be valid"),
            ResourceId::new(resource).expect("resource should be valid"),
            UserId::new("user-1").expect("user should be valid"),
        );
        stream
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

/// Provides a freshly wired stack.
#[fixture]
pub fn stack() -> Stack {
    Stack::new()
}

/// Returns the opened session identifier.
///
/// # Panics
///
/// Panics if [`SESSION`] is not a valid identifier.
#[must_use]
pub fn session_id() -> SessionId {
    SessionId::new(SESSION).expect("session should be valid")
}

/// Builds an expert name.
///
/// # Panics
///
/// Panics when `value` is not a valid name.
#[must_use]
pub fn expert_name(value: &str) -> ExpertName {
    ExpertName::new(value).expect("expert name should be valid")
}

/// Builds an in-memory endpoint for `name`.
///
/// # Panics
///
/// Panics when `name` is not a valid expert name.
#[must_use]
pub fn endpoint(name: &str) -> ExpertEndpoint {
    ExpertEndpoint::new(name, format!("memory://{name}"), "analysis")
        .expect("endpoint should be valid")
}

/// Lets spawned connection and health tasks run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
