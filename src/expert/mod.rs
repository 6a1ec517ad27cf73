//! Domain expert integration.
//!
//! Each configured expert gets one [`services::DomainExpertClient`] owning a
//! transport connection, a circuit breaker and a health loop. The
//! [`services::IntegrationHub`] creates and closes clients and is the only
//! way the rest of the crate reaches an expert. The module follows hexagonal
//! architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
