//! Adapters for request dispatch ports.

mod hub_gateway;
pub mod memory;
mod publisher_sink;
