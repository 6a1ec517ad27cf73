//! Request dispatcher: routes requests to handlers and publishes responses.

use super::context::HandlerContext;
use super::delegation::{DelegationSettings, RequestBinding, TaskDelegator};
use super::registry::HandlerRegistry;
use crate::dispatch::{
    domain::{ContextEntry, ErrorKind, InboundRequest, Request, RequestId, Response, SessionId},
    ports::{ContextStore, EventSink, ExpertGateway, HandlerResult, RequestHandler},
};
use crate::expert::domain::{Task, TaskResult};
use dashmap::{DashMap, mapref::entry::Entry};
use mockable::Clock;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Channel type responses are published on, keyed by session.
pub const SESSION_CHANNEL: &str = "session";
/// Event type of published responses.
pub const RESPONSE_EVENT_TYPE: &str = "response";
/// Error message of responses to cancelled requests.
pub const CANCELLED_MESSAGE: &str = "request cancelled";
/// Time a cancelled handler gets to observe its token before it is aborted.
pub const CANCELLATION_GRACE: Duration = Duration::from_secs(1);

/// Dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Task polling behaviour.
    pub delegation: DelegationSettings,
    /// Channel type responses are published on.
    pub response_channel: String,
    /// Event type of published responses.
    pub response_event_type: String,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            delegation: DelegationSettings::default(),
            response_channel: SESSION_CHANNEL.to_owned(),
            response_event_type: RESPONSE_EVENT_TYPE.to_owned(),
        }
    }
}

struct InFlight {
    generation: u64,
    token: CancellationToken,
    exclusive: bool,
}

/// Removes the in-flight entry it was created for when dropped.
struct InFlightGuard<'a> {
    in_flight: &'a DashMap<RequestId, InFlight>,
    generation: u64,
    binding: RequestBinding,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let generation = self.generation;
        self.in_flight
            .remove_if(self.binding.request_id(), |_, entry| entry.generation == generation);
    }
}

enum Outcome {
    Completed(HandlerResult<Value>),
    Panicked,
    Cancelled,
}

/// Routes requests to handlers and turns every request into one response.
pub struct Dispatcher<S, C>
where
    S: ContextStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    store: Arc<S>,
    sink: Arc<dyn EventSink>,
    clock: Arc<C>,
    handlers: HandlerRegistry,
    delegator: Arc<TaskDelegator>,
    in_flight: DashMap<RequestId, InFlight>,
    generation: AtomicU64,
    settings: DispatchSettings,
}

impl<S, C> Dispatcher<S, C>
where
    S: ContextStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a dispatcher with no handlers.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        gateway: Arc<dyn ExpertGateway>,
        sink: Arc<dyn EventSink>,
        clock: Arc<C>,
        settings: DispatchSettings,
    ) -> Self {
        let delegation_clock: Arc<dyn Clock + Send + Sync> = clock.clone();
        let delegator = TaskDelegator::new(gateway, delegation_clock, settings.delegation.clone());
        Self {
            store,
            sink,
            clock,
            handlers: HandlerRegistry::new(),
            delegator: Arc::new(delegator),
            in_flight: DashMap::new(),
            generation: AtomicU64::new(0),
            settings,
        }
    }

    /// Appends a handler for `request_type`.
    pub fn register_handler(
        &self,
        request_type: impl Into<String>,
        handler: Arc<dyn RequestHandler>,
    ) {
        self.handlers.register(request_type, handler);
    }

    /// Returns the handler registry.
    #[must_use]
    pub const fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Returns the dispatcher configuration.
    #[must_use]
    pub const fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Returns whether `request_id` is currently being handled.
    #[must_use]
    pub fn is_in_flight(&self, request_id: &RequestId) -> bool {
        self.in_flight.contains_key(request_id)
    }

    /// Returns how many requests are being handled.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Handles one request and returns its response.
    ///
    /// Every failure becomes an error response. The response is also
    /// published to the request's session channel.
    pub async fn dispatch(&self, inbound: InboundRequest) -> Response {
        let request_id = RequestId::or_generate(inbound.id.as_deref());
        let session = inbound.session_id.trim().to_owned();
        let span = tracing::info_span!(
            "dispatch",
            request_id = %request_id,
            request_type = %inbound.request_type.trim(),
        );
        let response = self.run(request_id, inbound).instrument(span).await;
        self.publish_response(&session, &response);
        response
    }

    /// Cancels an in-flight request.
    ///
    /// Returns `false` for unknown or finished requests.
    pub fn cancel_request(&self, request_id: &RequestId) -> bool {
        let Some((_, entry)) = self.in_flight.remove(request_id) else {
            tracing::debug!(%request_id, "cancel ignored for request not in flight");
            return false;
        };
        entry.token.cancel();
        tracing::info!(%request_id, "request cancelled");
        true
    }

    /// Delegates a task to a domain expert.
    ///
    /// When the task's origin request is in flight, the delegation follows
    /// that request's cancellation and exclusivity.
    pub async fn delegate_to_expert(&self, expert: &str, task: Task) -> TaskResult {
        let binding = task
            .origin_request()
            .and_then(|origin| RequestId::new(origin).ok())
            .and_then(|origin| {
                self.in_flight.get(&origin).map(|entry| {
                    RequestBinding::new(origin.clone(), entry.token.clone(), entry.exclusive)
                })
            });
        self.delegator
            .delegate(expert, task, binding.as_ref())
            .await
    }

    async fn run(&self, request_id: RequestId, inbound: InboundRequest) -> Response {
        let timestamp = inbound.timestamp.unwrap_or_else(|| self.clock.utc());
        let request = match Request::from_inbound(request_id.clone(), timestamp, inbound) {
            Ok(request) => request,
            Err(err) => return self.rejected(request_id, err.to_string()),
        };
        if let Err(message) = self.validate_session(request.session_id()).await {
            return self.rejected(request_id, message);
        }
        let Some(handler) = self.handlers.resolve(&request) else {
            let message = format!(
                "no handler registered for request type: {}",
                request.request_type()
            );
            return self.rejected(request_id, message);
        };
        let Some(guard) = self.track(&request) else {
            let message = format!("request {request_id} is already in flight");
            return self.rejected(request_id, message);
        };

        let outcome = self.execute(handler, &request, guard.binding.clone()).await;
        drop(guard);
        self.respond(&request, outcome).await
    }

    async fn validate_session(&self, session_id: &SessionId) -> Result<(), String> {
        match self.store.is_valid_session(session_id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(format!("invalid session: {session_id}")),
            Err(err) => Err(format!("session validation failed: {err}")),
        }
    }

    fn track(&self, request: &Request) -> Option<InFlightGuard<'_>> {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let exclusive = request.exclusive_delegation();
        match self.in_flight.entry(request.id().clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(InFlight {
                    generation,
                    token: token.clone(),
                    exclusive,
                });
                Some(InFlightGuard {
                    in_flight: &self.in_flight,
                    generation,
                    binding: RequestBinding::new(request.id().clone(), token, exclusive),
                })
            }
        }
    }

    async fn execute(
        &self,
        handler: Arc<dyn RequestHandler>,
        request: &Request,
        binding: RequestBinding,
    ) -> Outcome {
        let token = binding.token().clone();
        let context = HandlerContext::new(
            binding,
            Arc::clone(&self.delegator),
            Arc::clone(&self.sink),
        );
        let owned = request.clone();
        let mut task = tokio::spawn(
            async move { handler.handle(&owned, context).await }.in_current_span(),
        );
        tokio::select! {
            biased;
            () = token.cancelled() => {
                tokio::spawn(reap_cancelled(task));
                Outcome::Cancelled
            }
            joined = &mut task => match joined {
                Ok(result) => Outcome::Completed(result),
                Err(err) if err.is_panic() => Outcome::Panicked,
                Err(_) => Outcome::Cancelled,
            },
        }
    }

    async fn respond(&self, request: &Request, outcome: Outcome) -> Response {
        let request_id = request.id().clone();
        let now = self.clock.utc();
        match outcome {
            Outcome::Completed(Ok(content)) => {
                let entries = vec![
                    ContextEntry::inbound(request),
                    ContextEntry::output(request, content.clone(), now),
                ];
                if let Err(err) = self.store.add_entries(request.session_id(), entries).await {
                    tracing::warn!(%request_id, error = %err, "failed to record session context");
                }
                tracing::info!(%request_id, "request handled");
                Response::success(request_id, content, now)
            }
            Outcome::Completed(Err(err)) => {
                let kind = err.kind();
                tracing::warn!(%request_id, error = %err, error_kind = %kind, "handler failed");
                Response::error(request_id, kind, err.to_string(), now)
            }
            Outcome::Panicked => {
                tracing::error!(%request_id, "handler panicked");
                Response::error(request_id, ErrorKind::HandlerExecution, "handler panicked", now)
            }
            Outcome::Cancelled => {
                tracing::info!(%request_id, "request finished as cancelled");
                Response::error(request_id, ErrorKind::Cancelled, CANCELLED_MESSAGE, now)
            }
        }
    }

    fn rejected(&self, request_id: RequestId, message: String) -> Response {
        tracing::info!(%request_id, reason = %message, "request rejected");
        Response::error(request_id, ErrorKind::Validation, message, self.clock.utc())
    }

    fn publish_response(&self, session: &str, response: &Response) {
        if session.is_empty() {
            return;
        }
        let data = match serde_json::to_value(response) {
            Ok(data) => data,
            Err(err) => {
                tracing::warn!(
                    request_id = %response.request_id(),
                    error = %err,
                    "failed to encode response"
                );
                return;
            }
        };
        if let Err(err) = self.sink.publish(
            &self.settings.response_channel,
            session,
            &self.settings.response_event_type,
            data,
        ) {
            tracing::warn!(
                request_id = %response.request_id(),
                error = %err,
                "failed to publish response"
            );
        }
    }
}

/// Lets a cancelled handler wind down, then aborts it.
async fn reap_cancelled(mut task: JoinHandle<HandlerResult<Value>>) {
    if tokio::time::timeout(CANCELLATION_GRACE, &mut task).await.is_err() {
        task.abort();
        tracing::debug!("aborted handler that ignored cancellation");
    }
}
