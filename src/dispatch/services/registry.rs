//! Handler registry keyed by request type.

use crate::dispatch::{domain::Request, ports::RequestHandler};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Ordered handler lists keyed by request type.
///
/// Registration appends; resolution returns the first handler, in
/// registration order, whose `can_handle` accepts the request.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Vec<Arc<dyn RequestHandler>>>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler for `request_type`.
    pub fn register(&self, request_type: impl Into<String>, handler: Arc<dyn RequestHandler>) {
        let key = request_type.into().trim().to_owned();
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_default()
            .push(handler);
    }

    /// Returns the handler that should run `request`.
    #[must_use]
    pub fn resolve(&self, request: &Request) -> Option<Arc<dyn RequestHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(request.request_type())
            .and_then(|candidates| {
                candidates
                    .iter()
                    .find(|handler| handler.can_handle(request))
                    .cloned()
            })
    }

    /// Returns the request types with at least one handler, sorted.
    #[must_use]
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        types.sort();
        types
    }

    /// Returns how many handlers are registered for `request_type`.
    #[must_use]
    pub fn handler_count(&self, request_type: &str) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(request_type.trim())
            .map_or(0, Vec::len)
    }
}
