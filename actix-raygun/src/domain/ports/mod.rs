//! Domain ports for the reporting boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod report_transport;

#[cfg(test)]
pub use report_transport::MockReportTransport;
pub use report_transport::{FixtureReportTransport, ReportTransport, ReportTransportError};
