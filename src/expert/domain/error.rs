//! Error types for domain expert validation and parsing.

use thiserror::Error;

/// Errors returned while constructing expert integration domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExpertDomainError {
    /// The expert name is empty after trimming.
    #[error("domain expert name must not be empty")]
    EmptyExpertName,

    /// The expert name contains characters outside `[a-z0-9_-]`.
    #[error(
        "domain expert name '{0}' contains invalid characters (only lowercase alphanumeric, underscores and hyphens allowed)"
    )]
    InvalidExpertName(String),

    /// The expert name exceeds the 100-character limit.
    #[error("domain expert name exceeds 100 character limit: {0}")]
    ExpertNameTooLong(String),

    /// The endpoint address is empty.
    #[error("domain expert endpoint must not be empty")]
    EmptyEndpoint,

    /// The endpoint address has no `scheme://` prefix.
    #[error("domain expert endpoint '{0}' must have the form 'scheme://address'")]
    InvalidEndpoint(String),

    /// The endpoint kind is empty after trimming.
    #[error("domain expert kind must not be empty")]
    EmptyExpertKind,

    /// A tool definition name is empty after trimming.
    #[error("tool name must not be empty")]
    EmptyToolName,

    /// A task type is empty after trimming.
    #[error("task type must not be empty")]
    EmptyTaskType,

    /// A task identifier could not be parsed.
    #[error("invalid task identifier: {0}")]
    InvalidTaskId(String),
}

/// Error returned while parsing a connection state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown connection state: {0}")]
pub struct ParseConnectionStateError(pub String);

/// Error returned while parsing a circuit breaker state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown circuit state: {0}")]
pub struct ParseCircuitStateError(pub String);

/// Error returned while parsing a task status reported by an expert.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task status: {0}")]
pub struct ParseTaskStatusError(pub String);
