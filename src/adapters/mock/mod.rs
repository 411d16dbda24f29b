//! Mock implementations for testing.
//!
//! Test doubles for the transport seam, usable without network access.
//!
//! # Available Mocks
//!
//! - [`MockTransport`] - Scripted chunked transport
//! - [`MockHandle`] - Transport handle with configurable cancel methods

pub mod transport;

pub use transport::{CancelLog, MockHandle, MockStep, MockTransport};
