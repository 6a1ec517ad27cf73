//! Entries recorded in the conversation context store.

use super::{Modality, Request, RequestId, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which side of the exchange an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    /// The inbound request content.
    Inbound,
    /// The handler output.
    Output,
}

/// One entry appended to a session's context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    /// Request the entry belongs to.
    pub request_id: RequestId,
    /// Side of the exchange.
    pub source: EntrySource,
    /// Modality of the inbound content.
    pub modality: Modality,
    /// Recorded content.
    pub content: Value,
    /// When the entry was produced.
    pub recorded_at: DateTime<Utc>,
}

impl ContextEntry {
    /// Records the inbound content of `request`.
    #[must_use]
    pub fn inbound(request: &Request) -> Self {
        Self {
            request_id: request.id().clone(),
            source: EntrySource::Inbound,
            modality: request.modality(),
            content: request.content().clone(),
            recorded_at: request.timestamp(),
        }
    }

    /// Records the handler output for `request`.
    #[must_use]
    pub fn output(request: &Request, content: Value, recorded_at: DateTime<Utc>) -> Self {
        Self {
            request_id: request.id().clone(),
            source: EntrySource::Output,
            modality: request.modality(),
            content,
            recorded_at,
        }
    }
}

/// Session view returned by the context store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier.
    pub id: SessionId,
    /// When the session was opened.
    pub created_at: DateTime<Utc>,
    /// Entries in append order.
    pub entries: Vec<ContextEntry>,
}
