//! Error types and the error taxonomy surfaced in error responses.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors returned while constructing dispatch domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchDomainError {
    /// The request identifier is empty after trimming.
    #[error("request identifier must not be empty")]
    EmptyRequestId,

    /// The request type is empty after trimming.
    #[error("request type must not be empty")]
    EmptyRequestType,

    /// The session identifier is empty after trimming.
    #[error("session identifier must not be empty")]
    EmptySessionId,
}

/// Category of a failed request, recorded in the error response metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or unroutable request.
    Validation,
    /// The handler failed.
    HandlerExecution,
    /// A domain expert could not be reached.
    Connection,
    /// A domain expert call was refused by its circuit breaker.
    CircuitOpen,
    /// A delegated task exceeded its deadline.
    TaskTimeout,
    /// A domain expert name is not registered.
    UnknownExpert,
    /// The request was cancelled.
    Cancelled,
}

impl ErrorKind {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::HandlerExecution => "handler_execution",
            Self::Connection => "connection",
            Self::CircuitOpen => "circuit_open",
            Self::TaskTimeout => "task_timeout",
            Self::UnknownExpert => "unknown_expert",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
