//! Health snapshots recorded by domain expert health checks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of the most recent health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpertHealthStatus {
    /// Health has not been checked yet.
    Unknown,
    /// The discovery check succeeded.
    Healthy,
    /// The discovery check failed.
    Unhealthy,
}

impl ExpertHealthStatus {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Healthy => "healthy",
            Self::Unhealthy => "unhealthy",
        }
    }
}

impl fmt::Display for ExpertHealthStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Timestamped health snapshot for a domain expert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpertHealthSnapshot {
    status: ExpertHealthStatus,
    checked_at: DateTime<Utc>,
    message: Option<String>,
}

impl ExpertHealthSnapshot {
    /// Creates an `unknown` snapshot.
    #[must_use]
    pub const fn unknown(checked_at: DateTime<Utc>) -> Self {
        Self {
            status: ExpertHealthStatus::Unknown,
            checked_at,
            message: None,
        }
    }

    /// Creates a `healthy` snapshot.
    #[must_use]
    pub const fn healthy(checked_at: DateTime<Utc>) -> Self {
        Self {
            status: ExpertHealthStatus::Healthy,
            checked_at,
            message: None,
        }
    }

    /// Creates an `unhealthy` snapshot with details.
    #[must_use]
    pub fn unhealthy(checked_at: DateTime<Utc>, message: impl Into<String>) -> Self {
        let normalized = message.into().trim().to_owned();
        Self {
            status: ExpertHealthStatus::Unhealthy,
            checked_at,
            message: (!normalized.is_empty()).then_some(normalized),
        }
    }

    /// Returns the health status.
    #[must_use]
    pub const fn status(&self) -> ExpertHealthStatus {
        self.status
    }

    /// Returns the check timestamp.
    #[must_use]
    pub const fn checked_at(&self) -> DateTime<Utc> {
        self.checked_at
    }

    /// Returns the failure detail, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}
