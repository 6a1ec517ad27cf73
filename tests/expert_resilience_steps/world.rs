//! Shared world state for domain expert resilience BDD scenarios.

use mockable::DefaultClock;
use rstest::fixture;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use switchboard::dispatch::{
    ports::ExpertGateway,
    services::{DelegationSettings, TaskDelegator},
};
use switchboard::expert::{
    adapters::memory::{InMemoryExpertTransport, InMemoryTransportFactory},
    domain::{BreakerSettings, ConnectionState, ExpertEndpoint, ExpertName, TaskResult},
    ports::TransportFactory,
    services::{ClientSettings, HubResult, IntegrationHub},
};

/// Hub type used by the BDD world.
pub type TestHub = IntegrationHub<DefaultClock>;

/// Scenario world for domain expert resilience behaviour tests.
pub struct ExpertWorld {
    /// Transports handed to the hub by expert name.
    pub factory: Arc<InMemoryTransportFactory>,
    /// Hub built by the first given step.
    pub hub: Option<Arc<TestHub>>,
    /// Transports registered so far, by expert name.
    pub experts: HashMap<String, InMemoryExpertTransport>,
    /// Result of the last direct tool call.
    pub last_call: Option<HubResult<Value>>,
    /// Result of the last delegated task.
    pub last_task: Option<TaskResult>,
}

impl ExpertWorld {
    /// Creates a world without a hub.
    #[must_use]
    pub fn new() -> Self {
        Self {
            factory: Arc::new(InMemoryTransportFactory::new()),
            hub: None,
            experts: HashMap::new(),
            last_call: None,
            last_task: None,
        }
    }

    /// Builds the hub with the given breaker threshold.
    pub fn build_hub(&mut self, failure_threshold: u32) {
        let settings = ClientSettings {
            breaker: BreakerSettings {
                failure_threshold,
                ..BreakerSettings::default()
            },
            ..ClientSettings::default()
        };
        self.hub = Some(Arc::new(IntegrationHub::new(
            Arc::clone(&self.factory) as Arc<dyn TransportFactory>,
            Arc::new(DefaultClock),
            settings,
        )));
    }

    /// Returns the hub built by a given step.
    ///
    /// # Errors
    ///
    /// Returns an error when no hub was built.
    pub fn hub(&self) -> Result<&Arc<TestHub>, eyre::Report> {
        self.hub
            .as_ref()
            .ok_or_else(|| eyre::eyre!("no expert hub in scenario world"))
    }

    /// Returns the transport registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error when no expert was registered under `name`.
    pub fn expert(&self, name: &str) -> Result<&InMemoryExpertTransport, eyre::Report> {
        self.experts
            .get(name)
            .ok_or_else(|| eyre::eyre!("no expert named '{name}' in scenario world"))
    }

    /// Registers `transport` under `name` and waits until it is connected.
    ///
    /// # Errors
    ///
    /// Returns an error when registration fails or the expert never connects.
    pub fn connect_expert(
        &mut self,
        name: &str,
        transport: InMemoryExpertTransport,
    ) -> Result<(), eyre::Report> {
        let expert_name = ExpertName::new(name)?;
        self.factory.insert(expert_name.clone(), transport.clone());
        let hub = Arc::clone(self.hub()?);
        hub.register_expert(ExpertEndpoint::new(
            name,
            format!("memory://{name}"),
            "analysis",
        )?)?;
        run_async(async {
            for _ in 0..100 {
                let state = hub.client(&expert_name).map(|client| client.state());
                if state == Some(ConnectionState::Connected) {
                    return Ok(());
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            Err(eyre::eyre!("expert '{name}' did not connect"))
        })?;
        self.experts.insert(name.to_owned(), transport);
        Ok(())
    }

    /// Builds a delegator polling the hub quickly.
    ///
    /// # Errors
    ///
    /// Returns an error when no hub was built.
    pub fn delegator(&self) -> Result<TaskDelegator, eyre::Report> {
        let gateway = Arc::clone(self.hub()?) as Arc<dyn ExpertGateway>;
        let settings = DelegationSettings {
            poll_interval: Duration::from_millis(20),
            max_poll_interval: Duration::from_millis(100),
            ..DelegationSettings::default()
        };
        Ok(TaskDelegator::new(gateway, Arc::new(DefaultClock), settings))
    }
}

impl Default for ExpertWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> ExpertWorld {
    ExpertWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
