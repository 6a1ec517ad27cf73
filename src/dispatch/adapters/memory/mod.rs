//! In-memory adapters for request dispatch.

mod context_store;

pub use context_store::InMemoryContextStore;
