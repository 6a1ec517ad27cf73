//! Integration hub: the single authority over domain expert clients.

use super::client::{ClientSettings, DomainExpertClient, ExpertClientError};
use crate::expert::{
    domain::{
        CANCEL_TASK_TOOL, ExpertDescriptor, ExpertEndpoint, ExpertName, ResourceContent,
        SUBMIT_TASK_TOOL, TASK_RESULT_TOOL, TASK_STATUS_TOOL, Task, TaskId, TaskMetrics,
        TaskResult, TaskStatus, ToolListing,
    },
    ports::{EndpointSource, EndpointSourceError, TransportError, TransportFactory},
};
use mockable::Clock;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// Errors returned by the integration hub.
#[derive(Debug, Clone, Error)]
pub enum HubError {
    /// No expert is registered under the name.
    #[error("unknown expert: {0}")]
    UnknownExpert(ExpertName),

    /// An expert with the name is already registered.
    #[error("domain expert {0} is already registered")]
    DuplicateExpert(ExpertName),

    /// No transport could be built for the endpoint.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The expert client refused or failed the call.
    #[error(transparent)]
    Client(#[from] ExpertClientError),

    /// The expert answered with a payload the task protocol does not accept.
    #[error("domain expert {expert} violated the task protocol: {message}")]
    Protocol {
        /// Expert name.
        expert: ExpertName,
        /// What was wrong with the payload.
        message: String,
    },

    /// The endpoint source could not be read.
    #[error(transparent)]
    Source(#[from] EndpointSourceError),
}

/// Result type for integration hub operations.
pub type HubResult<T> = Result<T, HubError>;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SubmitReply {
    Ack { task_id: String },
    Bare(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StatusReply {
    Wrapped { status: String },
    Bare(String),
}

#[derive(Debug, Deserialize)]
struct RemoteTaskResult {
    success: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    metrics: Option<TaskMetrics>,
}

/// Owns one [`DomainExpertClient`] per registered expert.
///
/// Clients are created and closed only here; everything else reaches an
/// expert by name through the hub.
pub struct IntegrationHub<C>
where
    C: Clock + Send + Sync + 'static,
{
    factory: Arc<dyn TransportFactory>,
    clock: Arc<C>,
    settings: ClientSettings,
    clients: RwLock<BTreeMap<ExpertName, DomainExpertClient<C>>>,
}

impl<C> IntegrationHub<C>
where
    C: Clock + Send + Sync + 'static,
{
    /// Creates an empty hub.
    #[must_use]
    pub fn new(factory: Arc<dyn TransportFactory>, clock: Arc<C>, settings: ClientSettings) -> Self {
        Self {
            factory,
            clock,
            settings,
            clients: RwLock::new(BTreeMap::new()),
        }
    }

    /// Registers every endpoint and starts connecting in the background.
    ///
    /// Endpoints that cannot be registered are logged and skipped. Returns
    /// the names that were registered.
    pub fn startup(&self, endpoints: Vec<ExpertEndpoint>) -> Vec<ExpertName> {
        let registered = self.register_all(endpoints);
        tracing::info!(count = registered.len(), "integration hub started");
        registered
    }

    fn register_all(&self, endpoints: Vec<ExpertEndpoint>) -> Vec<ExpertName> {
        let mut registered = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            let name = endpoint.name().clone();
            match self.register_expert(endpoint) {
                Ok(()) => registered.push(name),
                Err(err) => {
                    tracing::warn!(expert = %name, error = %err, "skipping domain expert");
                }
            }
        }
        registered
    }

    /// Registers one expert and starts connecting in the background.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::DuplicateExpert`] when the name is taken, or
    /// [`HubError::Transport`] when no transport handles the endpoint.
    pub fn register_expert(&self, endpoint: ExpertEndpoint) -> HubResult<()> {
        let name = endpoint.name().clone();
        let client = {
            let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
            if clients.contains_key(&name) {
                return Err(HubError::DuplicateExpert(name));
            }
            let transport = self.factory.create(&endpoint)?;
            let client = DomainExpertClient::new(
                endpoint,
                transport,
                Arc::clone(&self.clock),
                self.settings.clone(),
            );
            clients.insert(name.clone(), client.clone());
            client
        };

        tracing::info!(expert = %name, "domain expert registered");
        tokio::spawn(async move {
            if let Err(err) = client.connect().await {
                tracing::debug!(expert = %client.name(), error = %err, "initial connect failed");
            }
        });
        Ok(())
    }

    /// Removes an expert and closes its client.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::UnknownExpert`] when the name is not registered.
    pub async fn deregister_expert(&self, name: &ExpertName) -> HubResult<()> {
        let removed = self
            .clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
        let client = removed.ok_or_else(|| HubError::UnknownExpert(name.clone()))?;
        client.close().await;
        tracing::info!(expert = %name, "domain expert deregistered");
        Ok(())
    }

    /// Registers endpoints from `source` that are not yet known.
    ///
    /// Known experts are never removed or replaced. Returns the names added.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Source`] when the source cannot be read.
    pub async fn reload_from(&self, source: &dyn EndpointSource) -> HubResult<Vec<ExpertName>> {
        let endpoints = source.load().await?;
        let fresh: Vec<ExpertEndpoint> = endpoints
            .into_iter()
            .filter(|endpoint| !self.contains(endpoint.name()))
            .collect();
        let added = self.register_all(fresh);
        if !added.is_empty() {
            tracing::info!(count = added.len(), "domain experts added by reload");
        }
        Ok(added)
    }

    /// Returns registered expert names in sorted order.
    #[must_use]
    pub fn list_experts(&self) -> Vec<ExpertName> {
        self.read_clients().keys().cloned().collect()
    }

    /// Describes every registered expert.
    #[must_use]
    pub fn describe_experts(&self) -> Vec<ExpertDescriptor> {
        self.read_clients()
            .values()
            .map(DomainExpertClient::descriptor)
            .collect()
    }

    /// Returns whether an expert is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &ExpertName) -> bool {
        self.read_clients().contains_key(name)
    }

    /// Returns the client for `name`.
    #[must_use]
    pub fn client(&self, name: &ExpertName) -> Option<DomainExpertClient<C>> {
        self.read_clients().get(name).cloned()
    }

    /// Lists the tools of one expert.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::UnknownExpert`] when the name is not registered.
    pub async fn list_expert_tools(&self, name: &ExpertName) -> HubResult<ToolListing> {
        Ok(self.require(name)?.list_tools().await)
    }

    /// Invokes a tool on one expert.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::UnknownExpert`] without any I/O when the name is
    /// not registered, or [`HubError::Client`] when the call fails.
    pub async fn invoke_expert_tool(
        &self,
        name: &ExpertName,
        tool: &str,
        arguments: Value,
    ) -> HubResult<Value> {
        Ok(self.require(name)?.call_tool(tool, arguments).await?)
    }

    /// Reads a resource from one expert.
    ///
    /// # Errors
    ///
    /// Fails under the same conditions as [`Self::invoke_expert_tool`].
    pub async fn read_expert_resource(
        &self,
        name: &ExpertName,
        uri: &str,
    ) -> HubResult<ResourceContent> {
        Ok(self.require(name)?.read_resource(uri).await?)
    }

    /// Submits a task and returns the identifier the expert tracks it by.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Protocol`] when the acknowledgement is malformed,
    /// plus the failures of [`Self::invoke_expert_tool`].
    pub async fn submit_task(&self, name: &ExpertName, task: &Task) -> HubResult<TaskId> {
        let payload = serde_json::to_value(task).map_err(|err| HubError::Protocol {
            expert: name.clone(),
            message: err.to_string(),
        })?;
        let reply = self.invoke_expert_tool(name, SUBMIT_TASK_TOOL, payload).await?;
        if reply.is_null() {
            return Ok(task.id());
        }
        let raw_id = match serde_json::from_value::<SubmitReply>(reply) {
            Ok(SubmitReply::Ack { task_id } | SubmitReply::Bare(task_id)) => task_id,
            Err(err) => return Err(protocol_error(name, &err)),
        };
        TaskId::parse(&raw_id).map_err(|err| protocol_error(name, &err))
    }

    /// Reads the status of a submitted task.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Protocol`] when the status is unrecognised, plus
    /// the failures of [`Self::invoke_expert_tool`].
    pub async fn task_status(&self, name: &ExpertName, task_id: TaskId) -> HubResult<TaskStatus> {
        let reply = self
            .invoke_expert_tool(name, TASK_STATUS_TOOL, task_arguments(task_id))
            .await?;
        let raw_status = match serde_json::from_value::<StatusReply>(reply) {
            Ok(StatusReply::Wrapped { status } | StatusReply::Bare(status)) => status,
            Err(err) => return Err(protocol_error(name, &err)),
        };
        TaskStatus::try_from(raw_status.as_str()).map_err(|err| protocol_error(name, &err))
    }

    /// Fetches the result of a finished task.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Protocol`] when the result is malformed, plus the
    /// failures of [`Self::invoke_expert_tool`].
    pub async fn task_result(&self, name: &ExpertName, task_id: TaskId) -> HubResult<TaskResult> {
        let reply = self
            .invoke_expert_tool(name, TASK_RESULT_TOOL, task_arguments(task_id))
            .await?;
        let remote: RemoteTaskResult =
            serde_json::from_value(reply).map_err(|err| protocol_error(name, &err))?;
        Ok(TaskResult {
            task_id,
            success: remote.success,
            result: remote.result,
            error: remote.error,
            metrics: remote.metrics,
        })
    }

    /// Asks the expert to cancel a task.
    ///
    /// # Errors
    ///
    /// Fails under the same conditions as [`Self::invoke_expert_tool`].
    pub async fn cancel_task(&self, name: &ExpertName, task_id: TaskId) -> HubResult<()> {
        self.invoke_expert_tool(name, CANCEL_TASK_TOOL, task_arguments(task_id))
            .await?;
        Ok(())
    }

    /// Closes every client and empties the hub.
    pub async fn shutdown(&self) {
        let drained: Vec<DomainExpertClient<C>> = {
            let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *clients).into_values().collect()
        };
        for client in &drained {
            client.close().await;
        }
        tracing::info!(count = drained.len(), "integration hub shut down");
    }

    fn require(&self, name: &ExpertName) -> HubResult<DomainExpertClient<C>> {
        self.client(name)
            .ok_or_else(|| HubError::UnknownExpert(name.clone()))
    }

    fn read_clients(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, BTreeMap<ExpertName, DomainExpertClient<C>>> {
        self.clients.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn task_arguments(task_id: TaskId) -> Value {
    json!({ "task_id": task_id.to_string() })
}

fn protocol_error(name: &ExpertName, err: &impl std::fmt::Display) -> HubError {
    HubError::Protocol {
        expert: name.clone(),
        message: err.to_string(),
    }
}
