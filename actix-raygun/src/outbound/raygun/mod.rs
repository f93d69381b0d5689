//! Raygun outbound adapter.
//!
//! This module provides a thin HTTP implementation of the `ReportTransport`
//! port against the Raygun entries endpoint.

mod dto;
mod http_transport;

pub use http_transport::{DEFAULT_ENDPOINT, RaygunHttpTransport, RaygunTransportSettings};
