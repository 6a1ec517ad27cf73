//! Endpoint source backed by a mutable in-memory list.

use crate::expert::{
    domain::ExpertEndpoint,
    ports::{EndpointSource, EndpointSourceResult},
};
use async_trait::async_trait;
use std::sync::{Arc, PoisonError, RwLock};

/// Endpoint list that tests can grow between reloads.
#[derive(Debug, Clone, Default)]
pub struct StaticEndpointSource {
    endpoints: Arc<RwLock<Vec<ExpertEndpoint>>>,
}

impl StaticEndpointSource {
    /// Creates a source serving `endpoints`.
    #[must_use]
    pub fn new(endpoints: Vec<ExpertEndpoint>) -> Self {
        Self {
            endpoints: Arc::new(RwLock::new(endpoints)),
        }
    }

    /// Appends an endpoint visible to the next load.
    pub fn push(&self, endpoint: ExpertEndpoint) {
        self.endpoints
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(endpoint);
    }
}

#[async_trait]
impl EndpointSource for StaticEndpointSource {
    async fn load(&self) -> EndpointSourceResult<Vec<ExpertEndpoint>> {
        Ok(self
            .endpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}
