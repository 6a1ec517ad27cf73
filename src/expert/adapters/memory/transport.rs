//! In-memory domain expert transport for tests and local orchestration.

use crate::expert::{
    domain::{ExpertEndpoint, ExpertName, ResourceContent, ToolDefinition},
    ports::{ExpertTransport, TransportError, TransportFactory, TransportResult},
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Scripted reply for one tool of an in-memory expert.
#[derive(Debug, Clone)]
pub enum ToolReply {
    /// Always answer with the value.
    Value(Value),
    /// Always fail with a remote error.
    Fail(String),
    /// Answer with each entry in turn, repeating the last one.
    Script(VecDeque<Result<Value, String>>),
    /// Never answer.
    Stall,
}

/// Counters of calls that reached an in-memory expert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportCalls {
    /// `connect` calls.
    pub connects: usize,
    /// `discover` calls.
    pub discoveries: usize,
    /// `invoke` calls.
    pub invocations: usize,
    /// `read_resource` calls.
    pub resource_reads: usize,
    /// `close` calls.
    pub closes: usize,
}

#[derive(Debug, Default)]
struct ExpertState {
    unreachable: Option<String>,
    connected: bool,
    latency: Option<Duration>,
    tools: Vec<ToolDefinition>,
    replies: HashMap<String, ToolReply>,
    resources: HashMap<String, ResourceContent>,
    invoked: Vec<(String, Value)>,
    calls: TransportCalls,
}

/// Scriptable in-memory expert.
///
/// Clones share state, so a test can keep one handle while the client owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryExpertTransport {
    state: Arc<Mutex<ExpertState>>,
}

impl InMemoryExpertTransport {
    /// Creates a reachable expert with no tools.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the advertised tool catalog.
    #[must_use]
    pub fn with_tools(self, tools: Vec<ToolDefinition>) -> Self {
        self.lock().tools = tools;
        self
    }

    /// Scripts the reply of one tool.
    #[must_use]
    pub fn with_reply(self, tool: impl Into<String>, reply: ToolReply) -> Self {
        self.set_reply(tool, reply);
        self
    }

    /// Registers a readable resource.
    #[must_use]
    pub fn with_resource(self, resource: ResourceContent) -> Self {
        {
            let mut state = self.lock();
            state.resources.insert(resource.uri.clone(), resource);
        }
        self
    }

    /// Replaces the scripted reply of one tool.
    pub fn set_reply(&self, tool: impl Into<String>, reply: ToolReply) {
        self.lock().replies.insert(tool.into(), reply);
    }

    /// Makes every call fail as unreachable until [`Self::restore`].
    pub fn make_unreachable(&self, reason: impl Into<String>) {
        let mut state = self.lock();
        state.unreachable = Some(reason.into());
        state.connected = false;
    }

    /// Makes the expert reachable again.
    pub fn restore(&self) {
        self.lock().unreachable = None;
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = Some(latency);
    }

    /// Returns call counters.
    #[must_use]
    pub fn calls(&self) -> TransportCalls {
        self.lock().calls
    }

    /// Returns every `(tool, arguments)` pair invoked so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<(String, Value)> {
        self.lock().invoked.clone()
    }

    /// Returns how many times `tool` was invoked.
    #[must_use]
    pub fn invocation_count(&self, tool: &str) -> usize {
        self.lock()
            .invoked
            .iter()
            .filter(|(name, _)| name == tool)
            .count()
    }

    /// Returns whether the expert considers itself connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    fn lock(&self) -> MutexGuard<'_, ExpertState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn delay(&self) {
        let latency = self.lock().latency;
        if let Some(pause) = latency {
            tokio::time::sleep(pause).await;
        }
    }

    fn ensure_reachable(state: &ExpertState) -> TransportResult<()> {
        match &state.unreachable {
            Some(reason) => Err(TransportError::Unreachable(reason.clone())),
            None if !state.connected => {
                Err(TransportError::Unreachable("not connected".to_owned()))
            }
            None => Ok(()),
        }
    }

    fn next_reply(state: &mut ExpertState, tool: &str) -> Option<ToolReply> {
        let reply = state.replies.get_mut(tool)?;
        match reply {
            ToolReply::Script(entries) => {
                let step = if entries.len() > 1 {
                    entries.pop_front()
                } else {
                    entries.front().cloned()
                };
                Some(match step {
                    Some(Ok(value)) => ToolReply::Value(value),
                    Some(Err(message)) => ToolReply::Fail(message),
                    None => ToolReply::Fail(format!("no scripted reply for {tool}")),
                })
            }
            other => Some(other.clone()),
        }
    }
}

#[async_trait]
impl ExpertTransport for InMemoryExpertTransport {
    async fn connect(&self) -> TransportResult<()> {
        self.delay().await;
        let mut state = self.lock();
        state.calls.connects += 1;
        if let Some(reason) = &state.unreachable {
            return Err(TransportError::Unreachable(reason.clone()));
        }
        state.connected = true;
        Ok(())
    }

    async fn discover(&self) -> TransportResult<Vec<ToolDefinition>> {
        self.delay().await;
        let mut state = self.lock();
        state.calls.discoveries += 1;
        Self::ensure_reachable(&state)?;
        Ok(state.tools.clone())
    }

    async fn invoke(&self, tool: &str, arguments: Value) -> TransportResult<Value> {
        self.delay().await;
        let reply = {
            let mut state = self.lock();
            state.calls.invocations += 1;
            Self::ensure_reachable(&state)?;
            state.invoked.push((tool.to_owned(), arguments));
            Self::next_reply(&mut state, tool)
        };

        match reply {
            Some(ToolReply::Value(value)) => Ok(value),
            Some(ToolReply::Fail(message)) => Err(TransportError::Remote(message)),
            Some(ToolReply::Stall) => std::future::pending().await,
            Some(ToolReply::Script(_)) | None => {
                Err(TransportError::Remote(format!("unknown tool: {tool}")))
            }
        }
    }

    async fn read_resource(&self, uri: &str) -> TransportResult<ResourceContent> {
        self.delay().await;
        let mut state = self.lock();
        state.calls.resource_reads += 1;
        Self::ensure_reachable(&state)?;
        state
            .resources
            .get(uri)
            .cloned()
            .ok_or_else(|| TransportError::Remote(format!("unknown resource: {uri}")))
    }

    async fn close(&self) -> TransportResult<()> {
        let mut state = self.lock();
        state.calls.closes += 1;
        state.connected = false;
        Ok(())
    }
}

/// Factory handing out pre-registered in-memory experts by name.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTransportFactory {
    experts: Arc<Mutex<HashMap<ExpertName, InMemoryExpertTransport>>>,
}

impl InMemoryTransportFactory {
    /// Creates an empty factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the expert served for `name`, replacing any previous one.
    pub fn insert(&self, name: ExpertName, expert: InMemoryExpertTransport) {
        self.experts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, expert);
    }
}

impl TransportFactory for InMemoryTransportFactory {
    fn create(&self, endpoint: &ExpertEndpoint) -> TransportResult<Arc<dyn ExpertTransport>> {
        let experts = self.experts.lock().unwrap_or_else(PoisonError::into_inner);
        experts
            .get(endpoint.name())
            .cloned()
            .map(|expert| Arc::new(expert) as Arc<dyn ExpertTransport>)
            .ok_or_else(|| TransportError::UnsupportedScheme(endpoint.scheme().to_owned()))
    }
}
