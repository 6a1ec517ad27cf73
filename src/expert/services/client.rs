//! Domain expert client owning one transport connection.

use super::health;
use crate::expert::{
    domain::{
        Admission, BreakerSettings, CircuitBreaker, CircuitState, ConnectionState,
        ExpertDescriptor, ExpertEndpoint, ExpertHealthSnapshot, ExpertName, ExpertStatus,
        ResourceContent, ToolListing,
    },
    ports::{ExpertTransport, TransportError, TransportResult},
};
use mockable::Clock;
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Timing and retry settings for a domain expert client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// Upper bound on establishing the transport connection.
    pub connect_timeout: Duration,
    /// Upper bound on every RPC call.
    pub call_timeout: Duration,
    /// Base period between health checks.
    pub health_interval: Duration,
    /// Maximum deviation applied to each health period.
    pub health_jitter: Duration,
    /// Delay before the first reconnect attempt.
    pub reconnect_base_delay: Duration,
    /// Ceiling for the doubling reconnect delay.
    pub reconnect_max_delay: Duration,
    /// Reconnect attempts before giving up until the next health tick.
    pub max_reconnect_attempts: u32,
    /// Circuit breaker settings.
    pub breaker: BreakerSettings,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            call_timeout: Duration::from_secs(30),
            health_interval: Duration::from_secs(30),
            health_jitter: Duration::from_secs(3),
            reconnect_base_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(30),
            max_reconnect_attempts: 5,
            breaker: BreakerSettings::default(),
        }
    }
}

/// Errors returned by domain expert client calls.
#[derive(Debug, Clone, Error)]
pub enum ExpertClientError {
    /// The client is not connected; no call was attempted.
    #[error("domain expert {expert} is not connected (state: {state})")]
    NotConnected {
        /// Expert name.
        expert: ExpertName,
        /// State observed when the call was refused.
        state: ConnectionState,
    },

    /// The transport failed.
    #[error("connection to domain expert {expert} failed: {message}")]
    Connection {
        /// Expert name.
        expert: ExpertName,
        /// Transport failure detail.
        message: String,
    },

    /// The circuit breaker refused the call; no call was attempted.
    #[error("circuit breaker for domain expert {0} is open")]
    CircuitOpen(ExpertName),

    /// The call did not finish in time.
    #[error("{operation} on domain expert {expert} timed out after {after:?}")]
    Timeout {
        /// Expert name.
        expert: ExpertName,
        /// Operation that timed out.
        operation: &'static str,
        /// Configured bound.
        after: Duration,
    },

    /// The expert answered with an error.
    #[error("domain expert {expert} returned an error: {message}")]
    Remote {
        /// Expert name.
        expert: ExpertName,
        /// Remote error message.
        message: String,
    },
}

impl ExpertClientError {
    fn from_transport(expert: &ExpertName, err: TransportError) -> Self {
        match err {
            TransportError::Remote(message) => Self::Remote {
                expert: expert.clone(),
                message,
            },
            other => Self::Connection {
                expert: expert.clone(),
                message: other.to_string(),
            },
        }
    }
}

/// Result type for domain expert client calls.
pub type ExpertClientResult<T> = Result<T, ExpertClientError>;

pub(super) struct ClientInner<C> {
    pub(super) endpoint: ExpertEndpoint,
    pub(super) transport: Arc<dyn ExpertTransport>,
    pub(super) breaker: CircuitBreaker,
    pub(super) clock: Arc<C>,
    pub(super) settings: ClientSettings,
    state: Mutex<ConnectionState>,
    last_health: Mutex<Option<ExpertHealthSnapshot>>,
    pub(super) connect_lock: tokio::sync::Mutex<()>,
    health_loop: Mutex<Option<CancellationToken>>,
    closed: CancellationToken,
}

/// Client for one domain expert endpoint.
///
/// Cloning is cheap and every clone shares the same connection, breaker and
/// health loop. Only the owning hub creates and closes clients.
pub struct DomainExpertClient<C>
where
    C: Clock + Send + Sync + 'static,
{
    pub(super) inner: Arc<ClientInner<C>>,
}

impl<C> Clone for DomainExpertClient<C>
where
    C: Clock + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> DomainExpertClient<C>
where
    C: Clock + Send + Sync + 'static,
{
    /// Creates a disconnected client.
    #[must_use]
    pub fn new(
        endpoint: ExpertEndpoint,
        transport: Arc<dyn ExpertTransport>,
        clock: Arc<C>,
        settings: ClientSettings,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                breaker: CircuitBreaker::new(settings.breaker.clone()),
                endpoint,
                transport,
                clock,
                settings,
                state: Mutex::new(ConnectionState::Disconnected),
                last_health: Mutex::new(None),
                connect_lock: tokio::sync::Mutex::new(()),
                health_loop: Mutex::new(None),
                closed: CancellationToken::new(),
            }),
        }
    }

    /// Returns the expert name.
    #[must_use]
    pub fn name(&self) -> &ExpertName {
        self.inner.endpoint.name()
    }

    /// Returns the configured endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &ExpertEndpoint {
        &self.inner.endpoint
    }

    /// Returns the connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *lock(&self.inner.state)
    }

    /// Returns the circuit breaker state.
    #[must_use]
    pub fn breaker_state(&self) -> CircuitState {
        self.inner.breaker.state()
    }

    /// Returns the most recent health check.
    #[must_use]
    pub fn last_health(&self) -> Option<ExpertHealthSnapshot> {
        lock(&self.inner.last_health).clone()
    }

    /// Describes the expert for listings.
    #[must_use]
    pub fn descriptor(&self) -> ExpertDescriptor {
        let connection_state = self.state();
        let circuit_state = self.breaker_state();
        let endpoint = &self.inner.endpoint;
        ExpertDescriptor {
            name: endpoint.name().clone(),
            endpoint: endpoint.address().to_owned(),
            kind: endpoint.kind().to_owned(),
            capabilities: endpoint.capabilities().to_vec(),
            status: ExpertStatus::from_states(connection_state, circuit_state),
            connection_state,
            circuit_state,
            last_health: self.last_health(),
        }
    }

    /// Connects the transport and starts the health loop.
    ///
    /// Concurrent callers are serialised; a connected client returns
    /// immediately. A closed client never connects again.
    ///
    /// # Errors
    ///
    /// Returns [`ExpertClientError::Connection`] or
    /// [`ExpertClientError::Timeout`] when the handshake fails. The client is
    /// left in the `error` state and later health ticks retry. Returns
    /// [`ExpertClientError::NotConnected`] once the client has been closed.
    pub async fn connect(&self) -> ExpertClientResult<()> {
        let _serialised = self.inner.connect_lock.lock().await;
        if self.is_closed() {
            return Err(ExpertClientError::NotConnected {
                expert: self.name().clone(),
                state: self.state(),
            });
        }
        let current = self.state();
        if current == ConnectionState::Connected {
            return Ok(());
        }
        if current != ConnectionState::Reconnecting {
            self.transition(ConnectionState::Connecting);
        }

        match self.open_transport().await {
            Ok(()) => {
                self.transition(ConnectionState::Connected);
                self.start_health_loop();
                tracing::info!(expert = %self.name(), "domain expert connected");
                Ok(())
            }
            Err(err) => {
                self.transition(ConnectionState::Error);
                tracing::warn!(expert = %self.name(), error = %err, "domain expert connect failed");
                Err(err)
            }
        }
    }

    /// Lists the expert's tools.
    ///
    /// Failures yield an empty listing with an error marker.
    pub async fn list_tools(&self) -> ToolListing {
        let transport = Arc::clone(&self.inner.transport);
        match self
            .guarded("discover", async move { transport.discover().await })
            .await
        {
            Ok(tools) => ToolListing::available(tools),
            Err(err) => {
                tracing::debug!(expert = %self.name(), error = %err, "tool discovery degraded");
                ToolListing::unavailable(err.to_string())
            }
        }
    }

    /// Invokes a tool.
    ///
    /// # Errors
    ///
    /// Returns [`ExpertClientError`] when the client is not connected, the
    /// breaker is open, the call times out or the transport fails.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> ExpertClientResult<Value> {
        let transport = Arc::clone(&self.inner.transport);
        let tool = name.to_owned();
        self.guarded("call_tool", async move {
            transport.invoke(&tool, arguments).await
        })
        .await
    }

    /// Reads a resource.
    ///
    /// # Errors
    ///
    /// Fails under the same conditions as [`Self::call_tool`].
    pub async fn read_resource(&self, uri: &str) -> ExpertClientResult<ResourceContent> {
        let transport = Arc::clone(&self.inner.transport);
        let target = uri.to_owned();
        self.guarded("read_resource", async move {
            transport.read_resource(&target).await
        })
        .await
    }

    /// Returns whether [`Self::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }

    /// Stops the health loop, closes the transport and marks the client
    /// disconnected.
    ///
    /// Connects that have not started yet are refused afterwards.
    pub async fn close(&self) {
        self.inner.closed.cancel();
        let token = lock(&self.inner.health_loop).take();
        if let Some(health_loop) = token {
            health_loop.cancel();
        }

        let _serialised = self.inner.connect_lock.lock().await;
        match tokio::time::timeout(self.inner.settings.call_timeout, self.inner.transport.close())
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::debug!(expert = %self.name(), error = %err, "transport close failed");
            }
            Err(_) => tracing::debug!(expert = %self.name(), "transport close timed out"),
        }
        self.transition(ConnectionState::Disconnected);
        tracing::info!(expert = %self.name(), "domain expert disconnected");
    }

    pub(super) async fn open_transport(&self) -> ExpertClientResult<()> {
        let bound = self.inner.settings.connect_timeout;
        match tokio::time::timeout(bound, self.inner.transport.connect()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(ExpertClientError::from_transport(self.name(), err)),
            Err(_) => Err(ExpertClientError::Timeout {
                expert: self.name().clone(),
                operation: "connect",
                after: bound,
            }),
        }
    }

    pub(super) fn transition(&self, target: ConnectionState) -> bool {
        let mut state = lock(&self.inner.state);
        let current = *state;
        if current == target {
            return true;
        }
        if !current.can_transition_to(target) {
            tracing::debug!(
                expert = %self.name(),
                from = %current,
                to = %target,
                "ignoring invalid connection transition"
            );
            return false;
        }
        tracing::debug!(expert = %self.name(), from = %current, to = %target, "connection state changed");
        *state = target;
        true
    }

    pub(super) fn record_health(&self, snapshot: ExpertHealthSnapshot) {
        *lock(&self.inner.last_health) = Some(snapshot);
    }

    fn start_health_loop(&self) {
        let mut slot = lock(&self.inner.health_loop);
        if slot.as_ref().is_some_and(|token| !token.is_cancelled()) {
            return;
        }
        let token = self.inner.closed.child_token();
        health::spawn_health_loop(Arc::downgrade(&self.inner), token.clone());
        *slot = Some(token);
    }

    async fn guarded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = TransportResult<T>>,
    ) -> ExpertClientResult<T> {
        let state = self.state();
        if !state.accepts_calls() {
            return Err(ExpertClientError::NotConnected {
                expert: self.name().clone(),
                state,
            });
        }
        let clock = &*self.inner.clock;
        let Some(admission) = self.inner.breaker.admit(clock) else {
            tracing::debug!(expert = %self.name(), operation, "call refused by open breaker");
            return Err(ExpertClientError::CircuitOpen(self.name().clone()));
        };
        let permit = CallPermit {
            breaker: &self.inner.breaker,
            admission: Some(admission),
        };

        let bound = self.inner.settings.call_timeout;
        match tokio::time::timeout(bound, call).await {
            Ok(Ok(value)) => {
                permit.succeed(clock);
                Ok(value)
            }
            Ok(Err(err)) => {
                permit.fail(clock);
                Err(ExpertClientError::from_transport(self.name(), err))
            }
            Err(_) => {
                permit.fail(clock);
                tracing::warn!(expert = %self.name(), operation, "domain expert call timed out");
                Err(ExpertClientError::Timeout {
                    expert: self.name().clone(),
                    operation,
                    after: bound,
                })
            }
        }
    }
}

/// Breaker admission held for the duration of one call.
///
/// Dropping the permit without recording an outcome, as happens when the
/// caller's future is cancelled, releases a half-open trial slot.
struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    admission: Option<Admission>,
}

impl CallPermit<'_> {
    fn succeed(mut self, clock: &impl Clock) {
        self.admission = None;
        self.breaker.record_success(clock);
    }

    fn fail(mut self, clock: &impl Clock) {
        self.admission = None;
        self.breaker.record_failure(clock);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if let Some(admission) = self.admission.take() {
            self.breaker.abandon(admission);
        }
    }
}

pub(super) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
