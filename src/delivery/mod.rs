//! Real-time event delivery to client connections.
//!
//! A transport loop serving one client registers a connection, receives an
//! [`services::EventStream`] and forwards whatever it yields. Publishers
//! address streams by exact `(channel type, resource)` key; each connection
//! has its own bounded queue so a slow client only ever loses its own
//! events. One heartbeat task per publisher keeps idle streams alive.

pub mod domain;
pub mod services;
