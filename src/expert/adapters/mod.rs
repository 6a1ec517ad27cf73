//! Adapter implementations for domain expert ports.

pub mod memory;

mod file;
mod socket;

pub use file::JsonFileEndpointSource;
pub use socket::{JsonLinesTransport, SocketTransportFactory, TCP_SCHEME};
