//! Inbound requests and their validated form.

use super::{DispatchDomainError, RequestId, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Input modality of a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// Typed text.
    #[default]
    Text,
    /// Transcribed or streamed audio.
    Voice,
    /// Image input.
    Image,
    /// Uploaded file.
    File,
    /// Machine-generated structured payload.
    Structured,
}

/// Request as received from the transport layer.
///
/// `id` and `timestamp` are optional; the dispatcher fills them in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundRequest {
    /// Caller-supplied identifier.
    #[serde(default)]
    pub id: Option<String>,
    /// Routing key used to select a handler.
    #[serde(rename = "type")]
    pub request_type: String,
    /// Session the request belongs to.
    pub session_id: String,
    /// Input modality.
    #[serde(default)]
    pub modality: Modality,
    /// Request payload.
    #[serde(default)]
    pub content: Value,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Caller-supplied creation time.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Allow at most one outstanding task per domain expert.
    #[serde(default)]
    pub exclusive_delegation: bool,
}

impl InboundRequest {
    /// Creates a text request without id or timestamp.
    #[must_use]
    pub fn new(
        request_type: impl Into<String>,
        session_id: impl Into<String>,
        content: Value,
    ) -> Self {
        Self {
            id: None,
            request_type: request_type.into(),
            session_id: session_id.into(),
            modality: Modality::Text,
            content,
            metadata: Map::new(),
            timestamp: None,
            exclusive_delegation: false,
        }
    }

    /// Sets the caller-supplied identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the modality.
    #[must_use]
    pub const fn with_modality(mut self, modality: Modality) -> Self {
        self.modality = modality;
        self
    }

    /// Marks the request as allowing one outstanding task per expert.
    #[must_use]
    pub const fn exclusive(mut self) -> Self {
        self.exclusive_delegation = true;
        self
    }
}

/// Validated request handed to handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    id: RequestId,
    #[serde(rename = "type")]
    request_type: String,
    session_id: SessionId,
    modality: Modality,
    content: Value,
    metadata: Map<String, Value>,
    timestamp: DateTime<Utc>,
    exclusive_delegation: bool,
}

impl Request {
    /// Validates an inbound request under an already assigned identity.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchDomainError`] when the type or session is blank.
    pub fn from_inbound(
        id: RequestId,
        timestamp: DateTime<Utc>,
        inbound: InboundRequest,
    ) -> Result<Self, DispatchDomainError> {
        let request_type = inbound.request_type.trim().to_owned();
        if request_type.is_empty() {
            return Err(DispatchDomainError::EmptyRequestType);
        }
        let session_id = SessionId::new(inbound.session_id)?;
        Ok(Self {
            id,
            request_type,
            session_id,
            modality: inbound.modality,
            content: inbound.content,
            metadata: inbound.metadata,
            timestamp,
            exclusive_delegation: inbound.exclusive_delegation,
        })
    }

    /// Returns the request identifier.
    #[must_use]
    pub const fn id(&self) -> &RequestId {
        &self.id
    }

    /// Returns the routing key.
    #[must_use]
    pub fn request_type(&self) -> &str {
        &self.request_type
    }

    /// Returns the session identifier.
    #[must_use]
    pub const fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Returns the modality.
    #[must_use]
    pub const fn modality(&self) -> Modality {
        self.modality
    }

    /// Returns the payload.
    #[must_use]
    pub const fn content(&self) -> &Value {
        &self.content
    }

    /// Returns the metadata map.
    #[must_use]
    pub const fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Returns the assigned timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns whether delegation is exclusive per expert.
    #[must_use]
    pub const fn exclusive_delegation(&self) -> bool {
        self.exclusive_delegation
    }
}
