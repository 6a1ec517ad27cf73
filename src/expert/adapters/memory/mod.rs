//! In-memory adapters for domain expert integration.

mod endpoint_source;
mod transport;

pub use endpoint_source::StaticEndpointSource;
pub use transport::{InMemoryExpertTransport, InMemoryTransportFactory, ToolReply, TransportCalls};
