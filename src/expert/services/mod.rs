//! Application services for domain expert integration.

mod client;
mod health;
mod hub;


pub use client::{ClientSettings, DomainExpertClient, ExpertClientError, ExpertClientResult};
pub use hub::{HubError, HubResult, IntegrationHub};
