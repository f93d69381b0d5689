//! Panic-to-error middleware.
//!
//! [`Recover`] catches panics raised while a request is handled and returns
//! them as a [`RecoveredPanic`] error, rendered as a 500 response, instead of
//! letting them tear down the worker. The error carries the panic message, the original error
//! when the panic payload was one, and the stack trace of the panic site.
//!
//! The trace is recorded by a process-wide panic hook installed the first time
//! a [`Recover`] is built. The hook chains to whatever hook was installed
//! before it and stores the trace in a thread-local slot read back on the same
//! thread once the unwind is caught.

use std::any::Any;
use std::cell::RefCell;
use std::error::Error as StdError;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;
use std::task::{Context, Poll};

use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::StatusCode;
use actix_web::{Error, HttpResponse, ResponseError};
use futures_util::FutureExt;
use futures_util::future::{LocalBoxFuture, Ready, ready};
use tracing::error;

use super::report_context::ReportContext;
use super::request_detail::RequestSnapshot;
use crate::config::DEFAULT_SKIP_FRAMES;
use crate::domain::{Failure, StackTrace};
use crate::manager::Manager;

const NON_STRING_PAYLOAD: &str = "panic with a non-string payload";

thread_local! {
    static PANIC_TRACE: RefCell<Option<StackTrace>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let trace = StackTrace::capture();
            let _stored = PANIC_TRACE.try_with(|slot| {
                if let Ok(mut slot) = slot.try_borrow_mut() {
                    *slot = Some(trace);
                }
            });
            previous(info);
        }));
    });
}

fn take_panic_trace() -> Option<StackTrace> {
    PANIC_TRACE
        .try_with(|slot| slot.try_borrow_mut().ok().and_then(|mut slot| slot.take()))
        .ok()
        .flatten()
}

/// Error produced from a recovered panic.
///
/// # Examples
/// ```
/// use actix_raygun::middleware::RecoveredPanic;
///
/// let recovered = RecoveredPanic::from_payload(Box::new("boom"), 2);
/// assert_eq!(recovered.message(), "boom");
/// assert!(recovered.inner_error().is_none());
/// ```
pub struct RecoveredPanic {
    message: String,
    inner: Option<Box<dyn StdError + Send + Sync>>,
    stack_trace: StackTrace,
    reported: bool,
}

impl RecoveredPanic {
    /// Convert a caught panic payload.
    ///
    /// String payloads become the message. A `Box<dyn Error + Send + Sync>`
    /// payload (raised with [`std::panic::panic_any`]) is kept as the inner
    /// error. The panic-site trace recorded by the hook has its first
    /// `skip_frames` frames and the panic runtime frames removed; without a
    /// recorded trace the current stack is used instead.
    pub fn from_payload(payload: Box<dyn Any + Send>, skip_frames: usize) -> Self {
        let stack_trace = take_panic_trace()
            .unwrap_or_else(StackTrace::capture)
            .skip_frames(skip_frames)
            .trim_runtime_frames();

        let not_str = match payload.downcast::<&'static str>() {
            Ok(message) => return Self::with_message((*message).to_owned(), stack_trace),
            Err(other) => other,
        };
        let not_string = match not_str.downcast::<String>() {
            Ok(message) => return Self::with_message(*message, stack_trace),
            Err(other) => other,
        };
        match not_string.downcast::<Box<dyn StdError + Send + Sync>>() {
            Ok(inner) => Self {
                message: inner.to_string(),
                inner: Some(*inner),
                stack_trace,
                reported: false,
            },
            Err(_) => Self::with_message(NON_STRING_PAYLOAD.to_owned(), stack_trace),
        }
    }

    fn with_message(message: String, stack_trace: StackTrace) -> Self {
        Self {
            message,
            inner: None,
            stack_trace,
            reported: false,
        }
    }

    /// Panic message, or the inner error's text.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Error the panic was raised with, if it was one.
    pub fn inner_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.inner.as_deref()
    }

    /// Trace starting at the panic site.
    pub fn stack_trace(&self) -> &StackTrace {
        &self.stack_trace
    }

    /// Whether [`Recover::reporting`] already submitted this panic.
    #[must_use]
    pub const fn is_reported(&self) -> bool {
        self.reported
    }

    pub(crate) const fn mark_reported(&mut self) {
        self.reported = true;
    }

    /// Describe this panic for the reporter.
    pub fn to_failure(&self) -> Failure {
        let class_name = self
            .inner
            .as_deref()
            .map_or("panic", |_| "panic(error)")
            .to_owned();
        Failure::new(self.message.clone())
            .with_class_name(class_name)
            .with_status(StatusCode::INTERNAL_SERVER_ERROR.as_u16())
            .with_stack_trace(self.stack_trace.clone())
    }
}

impl fmt::Debug for RecoveredPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveredPanic")
            .field("message", &self.message)
            .field("inner", &self.inner)
            .field("frames", &self.stack_trace.len())
            .field("reported", &self.reported)
            .finish()
    }
}

impl fmt::Display for RecoveredPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for RecoveredPanic {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner
            .as_deref()
            .map(|inner| inner as &(dyn StdError + 'static))
    }
}

impl ResponseError for RecoveredPanic {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn error_response(&self) -> HttpResponse {
        // The panic text stays server-side.
        HttpResponse::InternalServerError().body("Internal server error")
    }
}

/// Middleware converting handler panics into 500 errors.
///
/// Place it inside [`Notify`](super::Notify) so recovered panics are reported.
/// The panic comes back from the service as `Err`, so outer middleware sees
/// it the way it sees any other handler error.
///
/// # Examples
/// ```
/// use actix_raygun::middleware::Recover;
/// use actix_web::App;
///
/// let app = App::new().wrap(Recover::new());
/// ```
#[derive(Clone)]
pub struct Recover {
    skip_frames: usize,
    manager: Option<Manager>,
}

impl Recover {
    /// Recover panics without reporting them here.
    #[must_use]
    pub fn new() -> Self {
        install_panic_hook();
        Self {
            skip_frames: DEFAULT_SKIP_FRAMES,
            manager: None,
        }
    }

    /// Recover panics and report each one through `manager` before
    /// responding.
    ///
    /// Panics reported here are marked, and [`Notify`](super::Notify) does
    /// not submit them a second time. Submission failures re-panic with the
    /// transport error's message.
    #[must_use]
    pub fn reporting(manager: Manager) -> Self {
        Self {
            manager: Some(manager),
            ..Self::new()
        }
    }

    /// Number of hook frames dropped from recovered traces.
    #[must_use]
    pub fn skip_frames(mut self, count: usize) -> Self {
        self.skip_frames = count;
        self
    }
}

impl Default for Recover {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, B> Transform<S, ServiceRequest> for Recover
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RecoverMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RecoverMiddleware {
            service,
            skip_frames: self.skip_frames,
            manager: self.manager.clone(),
        }))
    }
}

/// Service wrapper produced by [`Recover`].
pub struct RecoverMiddleware<S> {
    service: S,
    skip_frames: usize,
    manager: Option<Manager>,
}

impl<S, B> Service<ServiceRequest> for RecoverMiddleware<S>
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
        let skip_frames = self.skip_frames;
        let method = req.method().clone();
        let path = req.path().to_owned();
        let reporter = self.manager.clone().map(|manager| {
            let snapshot = RequestSnapshot::capture(req.request(), manager.options());
            (manager, snapshot, ReportContext::attach(&req))
        });
        let called = panic::catch_unwind(AssertUnwindSafe(|| self.service.call(req)));

        Box::pin(async move {
            let outcome = match called {
                Ok(fut) => AssertUnwindSafe(fut).catch_unwind().await,
                Err(payload) => Err(payload),
            };
            match outcome {
                Ok(result) => result,
                Err(payload) => {
                    let mut recovered = RecoveredPanic::from_payload(payload, skip_frames);
                    error!(
                        panic_message = recovered.message(),
                        method = %method,
                        path = %path,
                        "recovered panic in request handler"
                    );
                    if let Some((manager, snapshot, context)) = reporter {
                        manager
                            .error_for_snapshot(snapshot, recovered.to_failure(), context.extras())
                            .await;
                        recovered.mark_reported();
                    }
                    Err(recovered.into())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for panic payload conversion and recovery.
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::config::ReporterOptions;
    use crate::domain::ApiKey;
    use crate::domain::ports::MockReportTransport;
    use actix_web::body::to_bytes;
    use actix_web::test as actix_test;
    use actix_web::{App, web};

    #[derive(Debug, thiserror::Error)]
    #[error("inventory drift")]
    struct InventoryDrift;

    async fn exploding_handler() -> HttpResponse {
        panic!("boom")
    }

    #[inline(never)]
    fn explode() {
        panic!("boom")
    }

    fn recovered_from(error: &Error) -> &RecoveredPanic {
        error
            .as_error::<RecoveredPanic>()
            .expect("error should be a recovered panic")
    }

    #[test]
    fn str_payload_becomes_message() {
        let recovered = RecoveredPanic::from_payload(Box::new("boom"), 2);
        assert_eq!(recovered.message(), "boom");
        assert_eq!(recovered.to_string(), "boom");
        assert!(!recovered.is_reported());
    }

    #[test]
    fn string_payload_becomes_message() {
        let recovered = RecoveredPanic::from_payload(Box::new(String::from("kaboom")), 2);
        assert_eq!(recovered.message(), "kaboom");
    }

    #[test]
    fn error_payload_is_kept_as_inner_error() {
        let inner: Box<dyn StdError + Send + Sync> = Box::new(InventoryDrift);
        let recovered = RecoveredPanic::from_payload(Box::new(inner), 2);
        assert_eq!(recovered.message(), "inventory drift");
        assert!(
            recovered
                .source()
                .is_some_and(|source| source.is::<InventoryDrift>()),
            "source should be the original error"
        );
    }

    #[test]
    fn other_payloads_get_a_generic_message() {
        let recovered = RecoveredPanic::from_payload(Box::new(42_u32), 2);
        assert_eq!(recovered.message(), NON_STRING_PAYLOAD);
    }

    #[test]
    fn failure_is_a_server_fault_with_the_panic_trace() {
        let recovered = RecoveredPanic::from_payload(Box::new("boom"), 0);
        let failure = recovered.to_failure();
        assert_eq!(failure.status(), Some(500));
        assert_eq!(failure.stack_trace(), Some(recovered.stack_trace()));
    }

    #[test]
    fn hook_trace_starts_at_the_panicking_function() {
        install_panic_hook();
        let payload = panic::catch_unwind(explode).expect_err("explode panics");

        let recovered = RecoveredPanic::from_payload(payload, DEFAULT_SKIP_FRAMES);

        let first = recovered
            .stack_trace()
            .frames()
            .first()
            .expect("panic site frame");
        assert!(
            first.to_string().contains("explode"),
            "trace should start at the panic site, got {first}"
        );
    }

    #[actix_web::test]
    async fn passes_successful_responses_through() {
        let app = actix_test::init_service(
            App::new()
                .wrap(Recover::new())
                .route("/", web::get().to(|| async { HttpResponse::Ok().body("fine") })),
        )
        .await;
        let res = actix_test::call_service(
            &app,
            actix_test::TestRequest::get().uri("/").to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(actix_test::read_body(res).await, "fine");
    }

    #[actix_web::test]
    async fn returns_handler_panics_as_500_errors() {
        let app = actix_test::init_service(App::new().wrap(Recover::new()).route(
            "/",
            web::get().to(exploding_handler),
        ))
        .await;
        let error = actix_test::try_call_service(
            &app,
            actix_test::TestRequest::get().uri("/").to_request(),
        )
        .await
        .expect_err("the panic comes back as an error");

        assert_eq!(
            error.as_response_error().status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let recovered = recovered_from(&error);
        assert_eq!(recovered.message(), "boom");
        let first = recovered
            .stack_trace()
            .frames()
            .first()
            .expect("panic site frame");
        assert!(
            first.to_string().contains("exploding_handler"),
            "trace should start in the handler, got {first}"
        );
        let body = to_bytes(error.error_response().into_body())
            .await
            .expect("static body");
        assert_eq!(body, "Internal server error");
    }

    #[actix_web::test]
    async fn preserves_the_identity_of_error_payloads() {
        let inner: Box<dyn StdError + Send + Sync> = Box::new(InventoryDrift);
        let address = std::ptr::from_ref::<dyn StdError + Send + Sync>(inner.as_ref()).cast::<()>();
        let slot = Arc::new(Mutex::new(Some(inner)));
        let app = actix_test::init_service(App::new().wrap(Recover::new()).route(
            "/",
            web::get().to(move || {
                let handler_slot = Arc::clone(&slot);
                async move {
                    if let Some(raised) = handler_slot.lock().expect("payload lock").take() {
                        panic::panic_any(raised);
                    }
                    HttpResponse::Ok().finish()
                }
            }),
        ))
        .await;
        let error = actix_test::try_call_service(
            &app,
            actix_test::TestRequest::get().uri("/").to_request(),
        )
        .await
        .expect_err("the panic comes back as an error");

        let kept = recovered_from(&error)
            .inner_error()
            .expect("inner error kept");
        assert_eq!(
            std::ptr::from_ref::<dyn StdError + Send + Sync>(kept).cast::<()>(),
            address
        );
    }

    #[actix_web::test]
    async fn reporting_variant_submits_and_marks_the_panic() {
        let mut transport = MockReportTransport::new();
        transport
            .expect_submit()
            .withf(|report, _| report.error.message == "boom" && report.request.is_some())
            .times(1)
            .returning(|_, _| Ok(()));
        let manager = Manager::new(
            ApiKey::try_new("key").expect("valid key"),
            ReporterOptions::default().into(),
            Arc::new(transport),
        );
        let app = actix_test::init_service(App::new().wrap(Recover::reporting(manager)).route(
            "/",
            web::get().to(exploding_handler),
        ))
        .await;
        let error = actix_test::try_call_service(
            &app,
            actix_test::TestRequest::get().uri("/").to_request(),
        )
        .await
        .expect_err("the panic comes back as an error");

        assert!(recovered_from(&error).is_reported());
    }
}
