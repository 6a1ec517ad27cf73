//! Public description of a registered domain expert.

use super::{CircuitState, ConnectionState, ExpertHealthSnapshot, ExpertName};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse availability reported to callers listing experts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpertStatus {
    /// Connected with a closed breaker.
    Connected,
    /// Not connected, or reconnecting gave up.
    Disconnected,
    /// Reachable but reconnecting or guarded by a tripped breaker.
    Degraded,
}

impl ExpertStatus {
    /// Derives availability from the connection and breaker states.
    #[must_use]
    pub const fn from_states(connection: ConnectionState, circuit: CircuitState) -> Self {
        match (connection, circuit) {
            (ConnectionState::Connected, CircuitState::Closed) => Self::Connected,
            (ConnectionState::Connected, _) | (ConnectionState::Reconnecting, _) => {
                Self::Degraded
            }
            _ => Self::Disconnected,
        }
    }

    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Degraded => "degraded",
        }
    }
}

impl fmt::Display for ExpertStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Snapshot describing one registered expert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpertDescriptor {
    /// Unique expert name.
    pub name: ExpertName,
    /// Transport address.
    pub endpoint: String,
    /// Expert kind.
    #[serde(rename = "type")]
    pub kind: String,
    /// Capability tags from configuration.
    pub capabilities: Vec<String>,
    /// Derived availability.
    pub status: ExpertStatus,
    /// Raw connection state.
    pub connection_state: ConnectionState,
    /// Raw breaker state.
    pub circuit_state: CircuitState,
    /// Most recent health check, if any ran.
    pub last_health: Option<ExpertHealthSnapshot>,
}
