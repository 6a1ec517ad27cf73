//! Service configuration.
//!
//! Configuration is layered by `ortho_config`: built-in defaults, then a TOML
//! file, then `SWITCHBOARD_*` environment variables, then command-line flags.
//! The file is found through `--config-path`, `SWITCHBOARD_CONFIG_PATH` or
//! the default discovery locations. Every field has a default, so no source
//! is required. Durations are expressed in milliseconds.
//!
//! ```toml
//! endpoints_file = "/etc/switchboard/experts.json"
//! reload_interval_ms = 30000
//! call_timeout_ms = 15000
//! queue_capacity = 200
//! overflow_policy = "drop_oldest"
//! ```

use crate::delivery::domain::OverflowPolicy;
use crate::delivery::services::{DEFAULT_HEARTBEAT_INTERVAL, QueueSettings};
use crate::dispatch::services::{DelegationSettings, DispatchSettings};
use crate::expert::domain::BreakerSettings;
use crate::expert::services::ClientSettings;
use crate::telemetry::DEFAULT_LOG_FILTER;
use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Longest accepted timeout, in milliseconds (one week).
pub const MAX_TIMEOUT_MS: u64 = 7 * 24 * 60 * 60 * 1000;

/// Errors returned when a loaded configuration cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A value that must be positive was zero.
    #[error("{field} must be greater than zero")]
    Zero {
        /// Offending field.
        field: &'static str,
    },

    /// A timeout exceeded [`MAX_TIMEOUT_MS`].
    #[error("{field} must not exceed {MAX_TIMEOUT_MS} ms, got {value}")]
    TooLong {
        /// Offending field.
        field: &'static str,
        /// Rejected value.
        value: u64,
    },
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Top-level service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "SWITCHBOARD")]
#[serde(default)]
pub struct SwitchboardConfig {
    /// JSON file listing domain experts, read at startup and on reload.
    #[ortho_config(cli_short = 'e')]
    pub endpoints_file: Option<Utf8PathBuf>,
    /// Period between endpoint file reloads; `0` disables reloading.
    #[ortho_config(cli_short = 'r')]
    pub reload_interval_ms: u64,
    /// Filter used when `RUST_LOG` is unset.
    #[ortho_config(cli_short = 'l')]
    pub log_filter: String,

    /// Connection handshake bound.
    #[ortho_config(cli_short = 'c')]
    pub connect_timeout_ms: u64,
    /// Per-call bound.
    #[ortho_config(cli_short = 't')]
    pub call_timeout_ms: u64,
    /// Base health check period.
    #[ortho_config(cli_short = 'i')]
    pub health_interval_ms: u64,
    /// Maximum health period jitter.
    #[ortho_config(cli_short = 'j')]
    pub health_jitter_ms: u64,
    /// First reconnect delay.
    #[ortho_config(cli_short = 'b')]
    pub reconnect_base_delay_ms: u64,
    /// Reconnect delay ceiling.
    #[ortho_config(cli_short = 'm')]
    pub reconnect_max_delay_ms: u64,
    /// Reconnect attempts per outage.
    #[ortho_config(cli_short = 'a')]
    pub max_reconnect_attempts: u32,

    /// Consecutive failures that open a breaker.
    #[ortho_config(cli_short = 'f')]
    pub breaker_failure_threshold: u32,
    /// Open period before a trial call.
    #[ortho_config(cli_short = 'd')]
    pub breaker_cool_down_ms: u64,
    /// Failure-rate window.
    #[ortho_config(cli_short = 'w')]
    pub breaker_window_ms: u64,
    /// Failure percentage that opens a breaker; `0` disables it.
    #[ortho_config(cli_short = 'p')]
    pub breaker_failure_rate_percent: u8,
    /// Outcomes needed before the rate is evaluated.
    #[ortho_config(cli_short = 'n')]
    pub breaker_minimum_calls: usize,

    /// First task poll delay.
    #[ortho_config(cli_short = 'P')]
    pub poll_interval_ms: u64,
    /// Task poll delay ceiling.
    #[ortho_config(cli_short = 'M')]
    pub max_poll_interval_ms: u64,
    /// Task poll delay growth in percent.
    #[ortho_config(cli_short = 'B')]
    pub poll_backoff_percent: u32,
    /// Wait for tasks without a deadline.
    #[ortho_config(cli_short = 'T')]
    pub task_timeout_ms: u64,
    /// Consecutive failed polls tolerated.
    #[ortho_config(cli_short = 'F')]
    pub max_poll_failures: u32,

    /// Pending events kept per connection.
    #[ortho_config(cli_short = 'q')]
    pub queue_capacity: usize,
    /// What a full queue loses.
    #[ortho_config(cli_short = 'o')]
    pub overflow_policy: OverflowPolicy,
    /// Heartbeat period.
    #[ortho_config(cli_short = 'H')]
    pub heartbeat_interval_ms: u64,
}

impl Default for SwitchboardConfig {
    fn default() -> Self {
        let client = ClientSettings::default();
        let breaker = &client.breaker;
        let delegation = DelegationSettings::default();
        let queue = QueueSettings::default();
        Self {
            endpoints_file: None,
            reload_interval_ms: 0,
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
            connect_timeout_ms: millis(client.connect_timeout),
            call_timeout_ms: millis(client.call_timeout),
            health_interval_ms: millis(client.health_interval),
            health_jitter_ms: millis(client.health_jitter),
            reconnect_base_delay_ms: millis(client.reconnect_base_delay),
            reconnect_max_delay_ms: millis(client.reconnect_max_delay),
            max_reconnect_attempts: client.max_reconnect_attempts,
            breaker_failure_threshold: breaker.failure_threshold,
            breaker_cool_down_ms: millis(breaker.cool_down),
            breaker_window_ms: millis(breaker.window),
            breaker_failure_rate_percent: breaker.failure_rate_percent,
            breaker_minimum_calls: breaker.minimum_calls,
            poll_interval_ms: millis(delegation.poll_interval),
            max_poll_interval_ms: millis(delegation.max_poll_interval),
            poll_backoff_percent: delegation.poll_backoff_percent,
            task_timeout_ms: millis(delegation.default_task_timeout),
            max_poll_failures: delegation.max_poll_failures,
            queue_capacity: queue.capacity,
            overflow_policy: queue.overflow_policy,
            heartbeat_interval_ms: millis(DEFAULT_HEARTBEAT_INTERVAL),
        }
    }
}

impl SwitchboardConfig {
    /// Checks values that would stall or overflow the runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Zero`] for a zero queue capacity, heartbeat or
    /// health period, and [`ConfigError::TooLong`] for timeouts above
    /// [`MAX_TIMEOUT_MS`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::Zero {
                field: "queue_capacity",
            });
        }
        for (field, value) in [
            ("heartbeat_interval_ms", self.heartbeat_interval_ms),
            ("health_interval_ms", self.health_interval_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        for (field, value) in [
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("call_timeout_ms", self.call_timeout_ms),
            ("task_timeout_ms", self.task_timeout_ms),
        ] {
            if value > MAX_TIMEOUT_MS {
                return Err(ConfigError::TooLong { field, value });
            }
        }
        Ok(())
    }

    /// Returns the domain expert client settings.
    #[must_use]
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            call_timeout: Duration::from_millis(self.call_timeout_ms),
            health_interval: Duration::from_millis(self.health_interval_ms),
            health_jitter: Duration::from_millis(self.health_jitter_ms),
            reconnect_base_delay: Duration::from_millis(self.reconnect_base_delay_ms),
            reconnect_max_delay: Duration::from_millis(self.reconnect_max_delay_ms),
            max_reconnect_attempts: self.max_reconnect_attempts,
            breaker: BreakerSettings {
                failure_threshold: self.breaker_failure_threshold,
                cool_down: Duration::from_millis(self.breaker_cool_down_ms),
                window: Duration::from_millis(self.breaker_window_ms),
                failure_rate_percent: self.breaker_failure_rate_percent,
                minimum_calls: self.breaker_minimum_calls,
            },
        }
    }

    /// Returns the dispatcher settings.
    #[must_use]
    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            delegation: DelegationSettings {
                poll_interval: Duration::from_millis(self.poll_interval_ms),
                max_poll_interval: Duration::from_millis(self.max_poll_interval_ms),
                poll_backoff_percent: self.poll_backoff_percent,
                default_task_timeout: Duration::from_millis(self.task_timeout_ms),
                max_poll_failures: self.max_poll_failures,
            },
            ..DispatchSettings::default()
        }
    }

    /// Returns the per-connection queue settings.
    #[must_use]
    pub const fn queue_settings(&self) -> QueueSettings {
        QueueSettings {
            capacity: self.queue_capacity,
            overflow_policy: self.overflow_policy,
        }
    }

    /// Returns the heartbeat period.
    #[must_use]
    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Returns the endpoint reload period, if reloading is enabled.
    #[must_use]
    pub fn reload_interval(&self) -> Option<Duration> {
        (self.endpoints_file.is_some() && self.reload_interval_ms > 0)
            .then(|| Duration::from_millis(self.reload_interval_ms))
    }
}
