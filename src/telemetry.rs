//! Structured logging initialisation.

use std::io::{self, IsTerminal};
use std::sync::OnceLock;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::{EnvFilter, fmt};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info";

static INSTALLED: OnceLock<()> = OnceLock::new();

/// Errors encountered while configuring logging.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The filter expression could not be parsed.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// The global subscriber could not be installed.
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] SetGlobalDefaultError),
}

/// Installs the global `fmt` subscriber writing to stderr.
///
/// The filter comes from `RUST_LOG`, falling back to `default_filter`.
/// Calls after the first successful one do nothing.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the fallback filter is invalid or another
/// subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> Result<(), TelemetryError> {
    if INSTALLED.get().is_some() {
        return Ok(());
    }
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)
            .map_err(|error| TelemetryError::Filter(error.to_string()))?,
    };
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    if INSTALLED.set(()).is_err() {
        tracing::debug!("tracing was initialised concurrently");
    }
    Ok(())
}
