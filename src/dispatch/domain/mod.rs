//! Domain model for request dispatch.
//!
//! Requests arrive as [`InboundRequest`] values, are validated into
//! [`Request`]s and always end in exactly one [`Response`].

mod context;
mod error;
mod ids;
mod request;
mod response;

pub use context::{ContextEntry, EntrySource, Session};
pub use error::{DispatchDomainError, ErrorKind};
pub use ids::{RequestId, SessionId};
pub use request::{InboundRequest, Modality, Request};
pub use response::{ERROR_KIND_KEY, Response, ResponseStatus};
