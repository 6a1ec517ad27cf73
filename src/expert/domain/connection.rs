//! Connection lifecycle state of a domain expert client.

use super::ParseConnectionStateError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection state owned by a single domain expert client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection has been established, or it was closed.
    Disconnected,
    /// The transport handshake is in progress.
    Connecting,
    /// The transport is connected and healthy.
    Connected,
    /// A health check failed and a reconnect is in progress.
    Reconnecting,
    /// Reconnecting gave up; later health ticks retry.
    Error,
}

impl ConnectionState {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
        }
    }

    /// Returns whether outbound calls may use the transport.
    #[must_use]
    pub const fn accepts_calls(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns whether transition to `target` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (_, Self::Disconnected)
                | (Self::Disconnected | Self::Error, Self::Connecting)
                | (Self::Connecting, Self::Connected | Self::Error)
                | (Self::Connected | Self::Error, Self::Reconnecting)
                | (Self::Reconnecting, Self::Connected | Self::Error)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ConnectionState {
    type Error = ParseConnectionStateError;

    fn try_from(value: &str) -> Result<Self, ParseConnectionStateError> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "disconnected" => Ok(Self::Disconnected),
            "connecting" => Ok(Self::Connecting),
            "connected" => Ok(Self::Connected),
            "reconnecting" => Ok(Self::Reconnecting),
            "error" => Ok(Self::Error),
            _ => Err(ParseConnectionStateError(value.to_owned())),
        }
    }
}
