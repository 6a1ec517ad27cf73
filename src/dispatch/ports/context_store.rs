//! Context store port: per-session conversation history.

use crate::dispatch::domain::{ContextEntry, Session, SessionId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for context store operations.
pub type ContextStoreResult<T> = Result<T, ContextStoreError>;

/// Persistence for session context.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Appends entries to a session in order.
    ///
    /// # Errors
    ///
    /// Returns [`ContextStoreError`] when the session is unknown or the
    /// write fails.
    async fn add_entries(
        &self,
        session_id: &SessionId,
        entries: Vec<ContextEntry>,
    ) -> ContextStoreResult<()>;

    /// Returns the session, if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`ContextStoreError`] when the lookup fails.
    async fn get_session(&self, session_id: &SessionId) -> ContextStoreResult<Option<Session>>;

    /// Returns whether requests may be dispatched for the session.
    ///
    /// # Errors
    ///
    /// Returns [`ContextStoreError`] when the lookup fails.
    async fn is_valid_session(&self, session_id: &SessionId) -> ContextStoreResult<bool>;
}

/// Errors returned by context store adapters.
#[derive(Debug, Clone, Error)]
pub enum ContextStoreError {
    /// The session does not exist.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// Generic runtime failure.
    #[error("context store error: {0}")]
    Runtime(Arc<dyn std::error::Error + Send + Sync>),
}

impl ContextStoreError {
    /// Wraps a runtime error from a store adapter.
    pub fn runtime(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Runtime(Arc::new(err))
    }
}
