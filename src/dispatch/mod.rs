//! Request dispatch.
//!
//! The [`services::Dispatcher`] validates inbound requests, routes them to
//! registered [`ports::RequestHandler`]s, delegates tasks to domain experts
//! and publishes every response to the request's session channel.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
