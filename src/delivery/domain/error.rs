//! Error types for event delivery validation.

use thiserror::Error;

/// Errors returned while constructing event delivery domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryDomainError {
    /// The channel type is empty after trimming.
    #[error("channel type must not be empty")]
    EmptyChannelType,

    /// The channel type contains characters outside `[a-z0-9_-]`.
    #[error("channel type '{0}' contains invalid characters")]
    InvalidChannelType(String),

    /// The channel type exceeds the 100-character limit.
    #[error("channel type exceeds 100 character limit: {0}")]
    ChannelTypeTooLong(String),

    /// The resource identifier is empty after trimming.
    #[error("resource identifier must not be empty")]
    EmptyResourceId,

    /// The user identifier is empty after trimming.
    #[error("user identifier must not be empty")]
    EmptyUserId,

    /// The event type is empty after trimming.
    #[error("event type must not be empty")]
    EmptyEventType,

    /// The overflow policy name is not recognised.
    #[error("unknown overflow policy: {0}")]
    UnknownOverflowPolicy(String),
}
