//! Transport port for remote procedure calls to a domain expert.

use crate::expert::domain::{ExpertEndpoint, ResourceContent, ToolDefinition};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Transport-agnostic RPC surface exposed by one domain expert endpoint.
///
/// Implementations own the wire encoding. Callers bound every method with
/// their own timeout, so implementations need not enforce one.
#[async_trait]
pub trait ExpertTransport: Send + Sync {
    /// Opens the underlying connection.
    async fn connect(&self) -> TransportResult<()>;

    /// Lists the tools the expert currently exposes.
    async fn discover(&self) -> TransportResult<Vec<ToolDefinition>>;

    /// Invokes a tool with JSON arguments.
    async fn invoke(&self, tool: &str, arguments: Value) -> TransportResult<Value>;

    /// Reads a resource by URI.
    async fn read_resource(&self, uri: &str) -> TransportResult<ResourceContent>;

    /// Closes the underlying connection.
    async fn close(&self) -> TransportResult<()>;
}

/// Builds transports for configured endpoints.
pub trait TransportFactory: Send + Sync {
    /// Creates an unconnected transport for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::UnsupportedScheme`] when no transport handles
    /// the endpoint's address scheme.
    fn create(&self, endpoint: &ExpertEndpoint) -> TransportResult<Arc<dyn ExpertTransport>>;
}

/// Errors returned by transport adapters.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The expert could not be reached.
    #[error("domain expert unreachable: {0}")]
    Unreachable(String),

    /// The expert answered with an error.
    #[error("domain expert returned an error: {0}")]
    Remote(String),

    /// No transport handles the address scheme.
    #[error("unsupported transport scheme: {0}")]
    UnsupportedScheme(String),

    /// Generic runtime failure.
    #[error("transport runtime error: {0}")]
    Runtime(Arc<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    /// Wraps a runtime error from a transport adapter.
    pub fn runtime(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Runtime(Arc::new(err))
    }
}
