//! Source of domain expert endpoint configuration.

use crate::expert::domain::{ExpertDomainError, ExpertEndpoint};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for endpoint source operations.
pub type EndpointSourceResult<T> = Result<T, EndpointSourceError>;

/// Supplies the current list of expert endpoints.
///
/// Sources may be read repeatedly; the hub only ever adds endpoints it has
/// not seen yet.
#[async_trait]
pub trait EndpointSource: Send + Sync {
    /// Loads every configured endpoint.
    async fn load(&self) -> EndpointSourceResult<Vec<ExpertEndpoint>>;
}

/// Errors returned by endpoint sources.
#[derive(Debug, Clone, Error)]
pub enum EndpointSourceError {
    /// An entry failed validation.
    #[error(transparent)]
    Domain(#[from] ExpertDomainError),

    /// The source could not be read or decoded.
    #[error("endpoint source error: {0}")]
    Runtime(Arc<dyn std::error::Error + Send + Sync>),
}

impl EndpointSourceError {
    /// Wraps a runtime error from a source adapter.
    pub fn runtime(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Runtime(Arc::new(err))
    }
}
