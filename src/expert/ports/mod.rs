//! Port contracts for domain expert integration.

mod endpoint_source;
mod transport;

pub use endpoint_source::{EndpointSource, EndpointSourceError, EndpointSourceResult};
pub use transport::{ExpertTransport, TransportError, TransportFactory, TransportResult};
