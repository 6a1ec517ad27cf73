//! Responses correlated 1:1 with requests.

use super::{ErrorKind, RequestId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Metadata key holding the [`ErrorKind`] of an error response.
pub const ERROR_KIND_KEY: &str = "error_kind";

/// Outcome of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    /// The handler succeeded.
    Success,
    /// The request failed.
    Error,
    /// Work continues asynchronously.
    Pending,
}

impl ResponseStatus {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Pending => "pending",
        }
    }
}

/// Response to exactly one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    request_id: RequestId,
    status: ResponseStatus,
    content: Value,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    metadata: Map<String, Value>,
}

impl Response {
    /// Creates a success response.
    #[must_use]
    pub fn success(request_id: RequestId, content: Value, timestamp: DateTime<Utc>) -> Self {
        Self {
            request_id,
            status: ResponseStatus::Success,
            content,
            timestamp,
            metadata: Map::new(),
        }
    }

    /// Creates a pending response.
    #[must_use]
    pub fn pending(request_id: RequestId, content: Value, timestamp: DateTime<Utc>) -> Self {
        Self {
            request_id,
            status: ResponseStatus::Pending,
            content,
            timestamp,
            metadata: Map::new(),
        }
    }

    /// Creates an error response with content `{"error": message}`.
    #[must_use]
    pub fn error(
        request_id: RequestId,
        kind: ErrorKind,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let mut metadata = Map::new();
        metadata.insert(ERROR_KIND_KEY.to_owned(), Value::from(kind.as_str()));
        Self {
            request_id,
            status: ResponseStatus::Error,
            content: json!({ "error": message.into() }),
            timestamp,
            metadata,
        }
    }

    /// Returns the correlated request identifier.
    #[must_use]
    pub const fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Returns the status.
    #[must_use]
    pub const fn status(&self) -> ResponseStatus {
        self.status
    }

    /// Returns the content.
    #[must_use]
    pub const fn content(&self) -> &Value {
        &self.content
    }

    /// Returns when the response was produced.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the metadata map.
    #[must_use]
    pub const fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Returns the error message of an error response.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self.status {
            ResponseStatus::Error => self.content.get("error").and_then(Value::as_str),
            ResponseStatus::Success | ResponseStatus::Pending => None,
        }
    }

    /// Returns the error kind of an error response.
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.metadata
            .get(ERROR_KIND_KEY)
            .and_then(|kind| serde_json::from_value(kind.clone()).ok())
    }
}
