//! Direct reporting entry point.
//!
//! [`Manager`] bundles the frozen options, the API key and a transport so a
//! failure can be reported from anywhere, not only from the middleware chain.
//! The middleware delegates to it.

use std::sync::Arc;

use actix_web::HttpRequest;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::ReporterOptions;
use crate::domain::ports::{ReportTransport, ReportTransportError};
use crate::domain::{ApiKey, ClientIdentity, ErrorDetail, Failure, Report, ReportExtras, StackTrace};
use crate::middleware::request_detail::RequestSnapshot;
use crate::outbound::raygun::{RaygunHttpTransport, RaygunTransportSettings};
use crate::skip::should_skip;

/// Path prefix of this crate's frames, removed from traces captured at report
/// time.
const REPORTER_MODULE: &str = concat!(env!("CARGO_CRATE_NAME"), "::");

/// Terminal state of one reporting attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// The report was accepted by the transport.
    Reported,
    /// The skip policy judged the failure not worth reporting.
    Skipped,
    /// Silent mode printed the report instead of sending it.
    Silenced,
}

/// Reporting service shared by middleware and application code.
///
/// Cloning is cheap; all clones share the same options, key and transport.
#[derive(Clone)]
pub struct Manager {
    options: Arc<ReporterOptions>,
    api_key: ApiKey,
    transport: Arc<dyn ReportTransport>,
    machine_name: Option<Arc<str>>,
}

impl Manager {
    /// Build a manager over an explicit transport.
    #[must_use]
    pub fn new(
        api_key: ApiKey,
        options: Arc<ReporterOptions>,
        transport: Arc<dyn ReportTransport>,
    ) -> Self {
        let machine_name = hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .map(Arc::from);
        Self {
            options,
            api_key,
            transport,
            machine_name,
        }
    }

    /// Build a manager sending reports to Raygun over HTTPS.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn raygun(
        api_key: ApiKey,
        options: Arc<ReporterOptions>,
        settings: RaygunTransportSettings,
    ) -> Result<Self, reqwest::Error> {
        let transport = RaygunHttpTransport::new(settings)?;
        Ok(Self::new(api_key, options, Arc::new(transport)))
    }

    /// Options this manager was built with.
    #[must_use]
    pub fn options(&self) -> &ReporterOptions {
        &self.options
    }

    /// Report `failure`, escalating transport failures.
    ///
    /// A `None` request produces a report without request detail and without
    /// a user, even when a user resolver is configured.
    ///
    /// # Panics
    ///
    /// Panics with the transport error's message when submission fails and
    /// the reporter is not silent. Failures of the reporting pipeline are
    /// never swallowed.
    pub async fn error(
        &self,
        request: Option<&HttpRequest>,
        failure: Failure,
        extras: ReportExtras,
    ) -> ReportOutcome {
        escalate(self.try_error(request, failure, extras).await)
    }

    /// Report `failure`, returning transport failures to the caller.
    ///
    /// # Errors
    ///
    /// Returns the transport error when submission fails.
    pub async fn try_error(
        &self,
        request: Option<&HttpRequest>,
        failure: Failure,
        extras: ReportExtras,
    ) -> Result<ReportOutcome, ReportTransportError> {
        if self.skips(request, &failure) {
            return Ok(ReportOutcome::Skipped);
        }
        let snapshot = request.map(|req| RequestSnapshot::capture(req, &self.options));
        self.deliver(snapshot, failure, extras).await
    }

    /// Report a failure whose request is only known from a snapshot.
    ///
    /// The skip policy sees no request here.
    pub(crate) async fn error_for_snapshot(
        &self,
        snapshot: RequestSnapshot,
        failure: Failure,
        extras: ReportExtras,
    ) -> ReportOutcome {
        if self.skips(None, &failure) {
            return ReportOutcome::Skipped;
        }
        escalate(self.deliver(Some(snapshot), failure, extras).await)
    }

    fn skips(&self, request: Option<&HttpRequest>, failure: &Failure) -> bool {
        let skipped = should_skip(request, &self.options, failure);
        if skipped {
            debug!(
                error_message = failure.message(),
                status = ?failure.status(),
                "failure skipped by policy"
            );
        }
        skipped
    }

    async fn deliver(
        &self,
        snapshot: Option<RequestSnapshot>,
        failure: Failure,
        extras: ReportExtras,
    ) -> Result<ReportOutcome, ReportTransportError> {
        let report = self.build_report(snapshot, failure, extras);

        if self.options.is_silent() {
            print_report(&report);
            info!(
                error_message = %report.error.message,
                frames = report.error.stack_trace.len(),
                "silent mode: report printed, not sent"
            );
            return Ok(ReportOutcome::Silenced);
        }

        self.transport.submit(&report, &self.api_key).await?;
        debug!(error_message = %report.error.message, "report submitted");
        Ok(ReportOutcome::Reported)
    }

    fn build_report(
        &self,
        snapshot: Option<RequestSnapshot>,
        failure: Failure,
        extras: ReportExtras,
    ) -> Report {
        let response_status = failure.status();
        let (message, class_name, stack_trace) = failure.into_parts();
        let stack_trace = stack_trace.unwrap_or_else(|| {
            StackTrace::capture()
                .trim_through_module(REPORTER_MODULE)
                .skip_frames(self.options.skip_frames())
        });
        let (request, user) =
            snapshot.map_or((None, None), |captured| (Some(captured.detail), captured.user));

        Report {
            occurred_on: Utc::now(),
            machine_name: self.machine_name.as_deref().map(str::to_owned),
            version: self.options.version().map(str::to_owned),
            error: ErrorDetail {
                message,
                class_name,
                stack_trace,
            },
            request,
            response_status,
            user_custom_data: extras.custom_data,
            tags: extras.tags,
            user,
            client: ClientIdentity::current(),
        }
    }
}

fn escalate(result: Result<ReportOutcome, ReportTransportError>) -> ReportOutcome {
    match result {
        Ok(outcome) => outcome,
        Err(error) => {
            warn!(%error, "report submission failed; escalating");
            panic!("{error}");
        }
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("options", &self.options)
            .field("api_key", &self.api_key)
            .finish_non_exhaustive()
    }
}

#[expect(
    clippy::print_stdout,
    reason = "silent mode prints reports locally for debugging"
)]
fn print_report(report: &Report) {
    println!("{}\n{}", report.error.message, report.error.stack_trace);
}
