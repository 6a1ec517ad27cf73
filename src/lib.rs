//! Switchboard: request routing core for a multimodal assistant.
//!
//! The crate accepts client requests, routes them to registered handlers,
//! delegates long-running work to remote domain expert services and streams
//! events back to connected clients.
//!
//! # Architecture
//!
//! Each subsystem follows hexagonal architecture principles:
//!
//! - **Domain**: Validated value types with no infrastructure dependencies
//! - **Ports**: Trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (in-memory, TCP, files)
//! - **Services**: Orchestration over ports
//!
//! # Modules
//!
//! - [`dispatch`]: Request validation, handler routing and task delegation
//! - [`expert`]: Domain expert clients, circuit breakers and the integration hub
//! - [`delivery`]: Connection registry, per-connection queues and heartbeats
//! - [`config`]: JSON configuration with environment overrides
//! - [`telemetry`]: Structured logging setup

pub mod config;
pub mod delivery;
pub mod dispatch;
pub mod expert;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod test_support;
