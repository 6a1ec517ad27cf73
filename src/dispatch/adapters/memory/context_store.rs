//! In-memory context store.

use crate::dispatch::{
    domain::{ContextEntry, Session, SessionId},
    ports::{ContextStore, ContextStoreError, ContextStoreResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Thread-safe in-memory [`ContextStore`].
///
/// Sessions exist only once opened with [`InMemoryContextStore::open_session`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryContextStore {
    sessions: Arc<RwLock<HashMap<SessionId, Session>>>,
}

impl InMemoryContextStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a session; reopening an existing session keeps its entries.
    pub fn open_session(&self, session_id: SessionId, created_at: DateTime<Utc>) {
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        sessions
            .entry(session_id.clone())
            .or_insert_with(|| Session {
                id: session_id,
                created_at,
                entries: Vec::new(),
            });
    }

    /// Removes a session and its entries.
    #[must_use]
    pub fn close_session(&self, session_id: &SessionId) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id)
            .is_some()
    }

    /// Returns the entries recorded for a session.
    #[must_use]
    pub fn entries(&self, session_id: &SessionId) -> Vec<ContextEntry> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .map(|session| session.entries.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    async fn add_entries(
        &self,
        session_id: &SessionId,
        entries: Vec<ContextEntry>,
    ) -> ContextStoreResult<()> {
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| ContextStoreError::SessionNotFound(session_id.clone()))?;
        session.entries.extend(entries);
        Ok(())
    }

    async fn get_session(&self, session_id: &SessionId) -> ContextStoreResult<Option<Session>> {
        Ok(self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned())
    }

    async fn is_valid_session(&self, session_id: &SessionId) -> ContextStoreResult<bool> {
        Ok(self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(session_id))
    }
}
