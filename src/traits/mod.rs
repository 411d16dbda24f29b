//! Trait abstractions for dependency injection and testability.
//!
//! # Traits
//!
//! - [`ChunkedTransport`] - issue a request whose body arrives in fragments
//! - [`TransportHandle`] - platform-neutral cancellation of an in-flight request

pub mod transport;

pub use transport::{
    teardown_transport, CancelMethod, ChunkedTransport, Headers, TransportConnection,
    TransportError, TransportEvent, TransportHandle, TransportRequest,
};
