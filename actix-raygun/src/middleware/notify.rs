//! Error-to-report middleware.
//!
//! [`Notify`] lets the wrapped service run, then hands any failure to the
//! [`Manager`]. A failure is either an `Err` from the inner service or a
//! response carrying an error (how actix surfaces handler errors). The
//! original result always flows back to the framework untouched.
//!
//! The request is consumed by the inner service, so an `Err` result is
//! reported from a snapshot taken before the call. The skip policy sees no
//! request for those failures; responses carrying an error still hand it the
//! live request.

use std::any::type_name;
use std::task::{Context, Poll};

use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::error::InternalError;
use actix_web::{Error, ResponseError};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use tracing::debug;

use super::recover::RecoveredPanic;
use super::report_context::ReportContext;
use super::request_detail::RequestSnapshot;
use crate::domain::Failure;
use crate::manager::Manager;

/// Describe an actix error for the reporter.
///
/// Recovered panics keep their panic-site trace; other errors expose their
/// response status so the default skip rule can filter client errors.
///
/// # Examples
/// ```
/// use actix_raygun::middleware::failure_from_error;
///
/// let error = actix_web::error::ErrorNotFound("no such order");
/// let failure = failure_from_error(&error);
/// assert_eq!(failure.status(), Some(404));
/// assert_eq!(failure.message(), "no such order");
/// ```
pub fn failure_from_error(error: &Error) -> Failure {
    if let Some(recovered) = error.as_error::<RecoveredPanic>() {
        return recovered.to_failure();
    }
    Failure::new(error.to_string())
        .with_class_name(class_name_of(error))
        .with_status(error.as_response_error().status_code().as_u16())
}

/// Errors built with actix's `Error*` helpers wrap their cause in
/// [`InternalError`], whose `Debug` output is the bare cause. Those are named
/// after the wrapper type; anything else is named from its `Debug` output.
fn class_name_of(error: &Error) -> String {
    if error.as_error::<InternalError<&'static str>>().is_some() {
        return type_name::<InternalError<&'static str>>().to_owned();
    }
    if error.as_error::<InternalError<String>>().is_some() {
        return type_name::<InternalError<String>>().to_owned();
    }
    type_from_debug(error.as_response_error())
}

/// Best-effort type name taken from an error's `Debug` output.
fn type_from_debug(error: &dyn ResponseError) -> String {
    let debug = format!("{error:?}");
    let end = debug
        .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == ':'))
        .unwrap_or(debug.len());
    match debug.get(..end) {
        Some(name) if !name.is_empty() => name.to_owned(),
        _ => "Error".to_owned(),
    }
}

/// Middleware reporting failed requests through a [`Manager`].
///
/// # Examples
/// ```no_run
/// use std::sync::Arc;
///
/// use actix_raygun::domain::{ApiKey, ports::FixtureReportTransport};
/// use actix_raygun::middleware::{Notify, Recover};
/// use actix_raygun::{Manager, ReporterOptions};
/// use actix_web::App;
///
/// let manager = Manager::new(
///     ApiKey::try_new("key").unwrap(),
///     ReporterOptions::builder().version("1.2.3").build(),
///     Arc::new(FixtureReportTransport),
/// );
/// let app = App::new().wrap(Recover::new()).wrap(Notify::new(manager));
/// ```
#[derive(Clone)]
pub struct Notify {
    manager: Manager,
}

impl Notify {
    /// Report failures through `manager`.
    pub fn new(manager: Manager) -> Self {
        Self { manager }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Notify
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = NotifyMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(NotifyMiddleware {
            service,
            manager: self.manager.clone(),
        }))
    }
}

/// Service wrapper produced by [`Notify`].
pub struct NotifyMiddleware<S> {
    service: S,
    manager: Manager,
}

impl<S, B> Service<ServiceRequest> for NotifyMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let manager = self.manager.clone();
        let context = ReportContext::attach(&req);
        let snapshot = RequestSnapshot::capture(req.request(), manager.options());
        let fut = self.service.call(req);

        Box::pin(async move {
            let result = fut.await;
            match &result {
                Ok(res) => {
                    if let Some(failure) = res.response().error().and_then(reportable_failure) {
                        manager
                            .error(Some(res.request()), failure, context.extras())
                            .await;
                    }
                }
                Err(error) => {
                    if let Some(failure) = reportable_failure(error) {
                        manager
                            .error_for_snapshot(snapshot, failure, context.extras())
                            .await;
                    }
                }
            }
            result
        })
    }
}

fn reportable_failure(error: &Error) -> Option<Failure> {
    if error
        .as_error::<RecoveredPanic>()
        .is_some_and(RecoveredPanic::is_reported)
    {
        debug!("recovered panic already reported");
        return None;
    }
    Some(failure_from_error(error))
}
