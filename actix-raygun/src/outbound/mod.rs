//! Outbound adapters.
//!
//! Concrete implementations of the domain's driven ports. Only the Raygun
//! HTTP transport lives here today.

pub mod raygun;
