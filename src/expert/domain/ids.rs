//! Identifier and validated-name types for domain experts.

use super::ExpertDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Maximum length for a domain expert name.
const MAX_EXPERT_NAME_LENGTH: usize = 100;

/// Validated, unique domain expert name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExpertName(String);

impl ExpertName {
    /// Creates a validated expert name.
    ///
    /// The input is trimmed and lowercased. Only characters in `[a-z0-9_-]`
    /// are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`ExpertDomainError`] when validation fails.
    pub fn new(value: impl Into<String>) -> Result<Self, ExpertDomainError> {
        let normalized = value.into().trim().to_ascii_lowercase();

        if normalized.is_empty() {
            return Err(ExpertDomainError::EmptyExpertName);
        }

        let is_valid = normalized.chars().all(|character| {
            character.is_ascii_lowercase()
                || character.is_ascii_digit()
                || character == '_'
                || character == '-'
        });
        if !is_valid {
            return Err(ExpertDomainError::InvalidExpertName(normalized));
        }

        if normalized.len() > MAX_EXPERT_NAME_LENGTH {
            return Err(ExpertDomainError::ExpertNameTooLong(normalized));
        }

        Ok(Self(normalized))
    }

    /// Returns the expert name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ExpertName {
    type Error = ExpertDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ExpertName> for String {
    fn from(value: ExpertName) -> Self {
        value.0
    }
}

impl AsRef<str> for ExpertName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ExpertName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Unique identifier for a task delegated to a domain expert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Creates a new random task identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a task identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parses a task identifier from its string form.
    ///
    /// # Errors
    ///
    /// Returns [`ExpertDomainError::InvalidTaskId`] when the value is not a
    /// UUID.
    pub fn parse(value: &str) -> Result<Self, ExpertDomainError> {
        Uuid::parse_str(value.trim())
            .map(Self)
            .map_err(|_| ExpertDomainError::InvalidTaskId(value.to_owned()))
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}
