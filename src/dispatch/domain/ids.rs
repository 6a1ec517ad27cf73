//! Identifier types for request dispatch.

use super::DispatchDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of one inbound request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RequestId(String);

impl RequestId {
    /// Creates a request identifier from trimmed input.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchDomainError::EmptyRequestId`] when the input is
    /// blank.
    pub fn new(value: impl Into<String>) -> Result<Self, DispatchDomainError> {
        let normalized = value.into().trim().to_owned();
        if normalized.is_empty() {
            return Err(DispatchDomainError::EmptyRequestId);
        }
        Ok(Self(normalized))
    }

    /// Generates a random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Uses the supplied identifier when it is usable, otherwise generates
    /// one.
    #[must_use]
    pub fn or_generate(value: Option<&str>) -> Self {
        value
            .and_then(|candidate| Self::new(candidate).ok())
            .unwrap_or_else(Self::generate)
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RequestId {
    type Error = DispatchDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RequestId> for String {
    fn from(value: RequestId) -> Self {
        value.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Identity of a conversation session held by the context store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Creates a session identifier from trimmed input.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchDomainError::EmptySessionId`] when the input is
    /// blank.
    pub fn new(value: impl Into<String>) -> Result<Self, DispatchDomainError> {
        let normalized = value.into().trim().to_owned();
        if normalized.is_empty() {
            return Err(DispatchDomainError::EmptySessionId);
        }
        Ok(Self(normalized))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SessionId {
    type Error = DispatchDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SessionId> for String {
    fn from(value: SessionId) -> Self {
        value.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
