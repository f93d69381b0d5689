//! Driven port for submitting reports to the error-reporting service.
//!
//! The domain owns the report shape; adapters own the wire format and the
//! network call.

use async_trait::async_trait;

use super::define_port_error;
use crate::domain::{ApiKey, Report};

define_port_error! {
    /// Errors surfaced while submitting a report.
    pub enum ReportTransportError {
        /// Network transport failed before a response arrived.
        Transport => "report transport failed: {message}",
        /// The submission exceeded the client timeout.
        Timeout => "report submission timed out: {message}",
        /// The service rate-limited the submission.
        RateLimited => "report submission rate limited: {message}",
        /// The service refused the API key.
        Unauthorized => "report submission unauthorised: {message}",
        /// The service refused the payload.
        Rejected => "report rejected: {message}",
        /// The report could not be encoded.
        Encode => "report encoding failed: {message}",
    }
}

/// Port for delivering one report.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReportTransport: Send + Sync {
    /// Submit `report` authenticated with `api_key`.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// use actix_raygun::domain::ports::{FixtureReportTransport, ReportTransport};
    ///
    /// let transport = FixtureReportTransport;
    /// transport.submit(&report, &api_key).await?;
    /// # Ok::<(), actix_raygun::domain::ports::ReportTransportError>(())
    /// ```
    async fn submit(&self, report: &Report, api_key: &ApiKey) -> Result<(), ReportTransportError>;
}

/// Fixture implementation accepting every report without sending it.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureReportTransport;

#[async_trait]
impl ReportTransport for FixtureReportTransport {
    async fn submit(
        &self,
        _report: &Report,
        _api_key: &ApiKey,
    ) -> Result<(), ReportTransportError> {
        Ok(())
    }
}
