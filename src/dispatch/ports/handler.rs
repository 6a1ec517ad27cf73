//! Handler port: application logic selected by request type.

use crate::dispatch::{
    domain::{ErrorKind, Request},
    services::HandlerContext,
};
use crate::expert::{
    domain::TaskId,
    services::{ExpertClientError, HubError},
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Result type for handler execution.
pub type HandlerResult<T> = Result<T, HandlerError>;

/// Application logic for one or more request types.
///
/// Handlers are registered under a request type; the first registered handler
/// whose [`RequestHandler::can_handle`] accepts the request runs it.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Returns whether this handler accepts `request`.
    fn can_handle(&self, _request: &Request) -> bool {
        true
    }

    /// Executes the request and returns the success content.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when the request cannot be completed. The
    /// dispatcher turns the error into an error response.
    async fn handle(&self, request: &Request, context: HandlerContext) -> HandlerResult<Value>;
}

/// Failures raised by request handlers.
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    /// Application failure with a caller-facing message.
    #[error("{0}")]
    Failed(String),

    /// A domain expert call failed.
    #[error(transparent)]
    Expert(#[from] HubError),

    /// A delegated task exceeded its deadline.
    #[error("task {0} timed out")]
    TaskTimeout(TaskId),

    /// Generic runtime failure.
    #[error("{0}")]
    Runtime(Arc<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    /// Creates an application failure.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Wraps a runtime error raised inside a handler.
    #[must_use]
    pub fn runtime(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Runtime(Arc::new(err))
    }

    /// Returns the error category reported in the response metadata.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Failed(_) | Self::Runtime(_) => ErrorKind::HandlerExecution,
            Self::TaskTimeout(_) => ErrorKind::TaskTimeout,
            Self::Expert(err) => match err {
                HubError::UnknownExpert(_) => ErrorKind::UnknownExpert,
                HubError::Client(ExpertClientError::CircuitOpen(_)) => ErrorKind::CircuitOpen,
                HubError::Client(
                    ExpertClientError::NotConnected { .. }
                    | ExpertClientError::Connection { .. }
                    | ExpertClientError::Timeout { .. },
                )
                | HubError::Transport(_) => ErrorKind::Connection,
                HubError::Client(ExpertClientError::Remote { .. })
                | HubError::DuplicateExpert(_)
                | HubError::Protocol { .. }
                | HubError::Source(_) => ErrorKind::HandlerExecution,
            },
        }
    }
}
