//! Runs the switchboard expert and delivery core as a long-lived service.
//!
//! Usage:
//!
//! ```text
//! switchboard [--config-path switchboard.toml] [--queue-capacity 200] ...
//! ```
//!
//! Configuration is layered from defaults, the TOML file, `SWITCHBOARD_*`
//! environment variables and flags; see [`SwitchboardConfig`]. Domain experts
//! are read from `endpoints_file`, a JSON array of endpoints such as:
//!
//! ```json
//! [{"name": "code_analysis", "endpoint": "tcp://127.0.0.1:7401", "type": "analysis"}]
//! ```
//!
//! The service connects to every listed expert, re-reads the file when
//! `reload_interval_ms` is set, starts the heartbeat and runs until
//! interrupted. Client-facing transports embed the library and build a
//! `Dispatcher` over the same hub and publisher; this binary hosts no inbound
//! request surface.

use mockable::DefaultClock;
use ortho_config::{OrthoConfig, OrthoError};
use std::sync::Arc;
use std::time::Duration;
use switchboard::config::{ConfigError, SwitchboardConfig};
use switchboard::delivery::services::{ConnectionRegistry, EventPublisher};
use switchboard::expert::{
    adapters::{JsonFileEndpointSource, SocketTransportFactory},
    services::{HubError, IntegrationHub},
};
use switchboard::telemetry::{self, TelemetryError};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can stop the service.
#[derive(Debug, Error)]
enum ServiceError {
    #[error("failed to load configuration: {source}")]
    Load {
        #[source]
        source: Arc<OrthoError>,
    },
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("failed to read domain expert endpoints: {0}")]
    Endpoints(#[from] HubError),
    #[error("failed to wait for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),
}

type Hub = IntegrationHub<DefaultClock>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = SwitchboardConfig::load().map_err(|source| ServiceError::Load { source })?;
    telemetry::init_tracing(&config.log_filter).map_err(ServiceError::from)?;
    config.validate().map_err(ServiceError::from)?;
    run(config).await.map_err(Into::into)
}

async fn run(config: SwitchboardConfig) -> Result<(), ServiceError> {
    let clock = Arc::new(DefaultClock);
    let hub: Arc<Hub> = Arc::new(IntegrationHub::new(
        Arc::new(SocketTransportFactory),
        Arc::clone(&clock),
        config.client_settings(),
    ));
    let registry = Arc::new(ConnectionRegistry::new(config.queue_settings(), clock));
    let publisher = EventPublisher::new(registry, config.heartbeat_interval());

    let source = config.endpoints_file.clone().map(JsonFileEndpointSource::new);
    let registered = match &source {
        Some(endpoints) => hub.reload_from(endpoints).await?,
        None => Vec::new(),
    };
    tracing::info!(experts = registered.len(), "switchboard started");
    publisher.start_heartbeat();

    let shutdown = CancellationToken::new();
    let reloader = match (source, config.reload_interval()) {
        (Some(endpoints), Some(period)) => Some(tokio::spawn(reload_endpoints(
            Arc::clone(&hub),
            endpoints,
            period,
            shutdown.child_token(),
        ))),
        _ => None,
    };

    let signal = tokio::signal::ctrl_c().await.map_err(ServiceError::Signal);
    tracing::info!(
        connections = publisher.registry().connection_count(),
        "shutting down switchboard"
    );
    shutdown.cancel();
    if let Some(handle) = reloader
        && let Err(err) = handle.await
    {
        tracing::warn!(error = %err, "endpoint reload task ended abnormally");
    }
    publisher.shutdown().await;
    hub.shutdown().await;
    signal
}

async fn reload_endpoints(
    hub: Arc<Hub>,
    source: JsonFileEndpointSource,
    period: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            () = token.cancelled() => return,
            _ = ticker.tick() => {}
        }
        match hub.reload_from(&source).await {
            Ok(added) if !added.is_empty() => {
                tracing::info!(path = %source.path(), added = added.len(), "endpoint file reloaded");
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(path = %source.path(), error = %err, "endpoint file reload failed");
            }
        }
    }
}
