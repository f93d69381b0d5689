//! Behavioural tests for the Recover and Notify middleware chain.

use std::sync::{Arc, Mutex};

use actix_http::Request;
use actix_raygun::domain::ports::{ReportTransport, ReportTransportError};
use actix_raygun::domain::{ApiKey, Report, StackFrame};
use actix_raygun::middleware::{Notify, Recover, RecoveredPanic, ReportContextExt};
use actix_raygun::{Manager, ReporterOptions};
use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::error::{ErrorInternalServerError, ErrorNotFound};
use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use actix_web::{App, HttpRequest, HttpResponse, web};
use async_trait::async_trait;
use rstest::{fixture, rstest};
use serde_json::json;

/// Transport double recording every submitted report.
#[derive(Clone, Default)]
struct RecordingTransport {
    reports: Arc<Mutex<Vec<Report>>>,
    failure: Option<ReportTransportError>,
}

impl RecordingTransport {
    fn failing(error: ReportTransportError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    fn reports(&self) -> Vec<Report> {
        self.reports.lock().expect("reports lock poisoned").clone()
    }
}

#[async_trait]
impl ReportTransport for RecordingTransport {
    async fn submit(&self, report: &Report, _api_key: &ApiKey) -> Result<(), ReportTransportError> {
        self.reports
            .lock()
            .expect("reports lock poisoned")
            .push(report.clone());
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[fixture]
fn transport() -> RecordingTransport {
    RecordingTransport::default()
}

fn manager(options: Arc<ReporterOptions>, transport: &RecordingTransport) -> Manager {
    Manager::new(
        ApiKey::try_new("integration-key").expect("valid key"),
        options,
        Arc::new(transport.clone()),
    )
}

async fn init_app(
    manager: Manager,
) -> impl Service<Request, Response = ServiceResponse<impl MessageBody<Error: Into<actix_web::Error>>>, Error = actix_web::Error> {
    init_app_with(Recover::new(), manager).await
}

async fn init_app_with(
    recover: Recover,
    manager: Manager,
) -> impl Service<Request, Response = ServiceResponse<impl MessageBody<Error: Into<actix_web::Error>>>, Error = actix_web::Error> {
    test::init_service(
        App::new()
            .wrap(recover)
            .wrap(Notify::new(manager))
            .route("/ok", web::get().to(ok))
            .route("/orders/{id}", web::get().to(order))
            .route("/missing", web::get().to(missing))
            .route("/fail", web::get().to(fail))
            .route("/panic", web::get().to(exploding_handler)),
    )
    .await
}

async fn ok() -> HttpResponse {
    HttpResponse::Ok().finish()
}

async fn order(id: web::Path<u32>) -> HttpResponse {
    HttpResponse::Ok().body(format!("order {id}"))
}

async fn missing() -> actix_web::Result<HttpResponse> {
    Err(ErrorNotFound("no such order"))
}

async fn fail(req: HttpRequest) -> actix_web::Result<HttpResponse> {
    req.report_tag("checkout");
    req.report_custom_data(json!({ "basket": 3 }));
    Err(ErrorInternalServerError("ledger offline"))
}

async fn exploding_handler() -> HttpResponse {
    panic!("boom")
}

fn is_reporter_frame(frame: &StackFrame) -> bool {
    frame
        .to_string()
        .trim_start_matches('<')
        .starts_with("actix_raygun::")
}

#[rstest]
#[actix_rt::test]
async fn successful_requests_are_not_reported(transport: RecordingTransport) {
    let app = init_app(manager(ReporterOptions::builder().build(), &transport)).await;

    let res = test::call_service(&app, TestRequest::get().uri("/ok").to_request()).await;

    assert_eq!(res.status(), StatusCode::OK);
    assert!(transport.reports().is_empty());
}

#[rstest]
#[actix_rt::test]
async fn routed_requests_pass_through_both_middlewares(transport: RecordingTransport) {
    let app = init_app(manager(ReporterOptions::builder().build(), &transport)).await;

    let res = test::call_service(&app, TestRequest::get().uri("/orders/17").to_request()).await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(test::read_body(res).await, "order 17");
    assert!(transport.reports().is_empty());
}

#[rstest]
#[actix_rt::test]
async fn client_errors_are_returned_without_submission(transport: RecordingTransport) {
    let app = init_app(manager(ReporterOptions::builder().build(), &transport)).await;

    let res = test::call_service(&app, TestRequest::get().uri("/missing").to_request()).await;

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(transport.reports().is_empty(), "404 must not be reported");
}

#[rstest]
#[actix_rt::test]
async fn server_errors_are_reported_with_request_context(transport: RecordingTransport) {
    let options = ReporterOptions::builder().version("4.2.0").build();
    let app = init_app(manager(options, &transport)).await;

    let res = test::call_service(
        &app,
        TestRequest::get()
            .uri("/fail?attempt=2")
            .insert_header(("authorization", "Bearer secret"))
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let reports = transport.reports();
    assert_eq!(reports.len(), 1, "exactly one report should be submitted");
    let report = reports.first().expect("one report");
    assert_eq!(report.error.message, "ledger offline");
    assert_eq!(report.response_status, Some(500));
    assert_eq!(report.version.as_deref(), Some("4.2.0"));
    assert_eq!(report.tags, vec!["checkout".to_owned()]);
    assert_eq!(report.user_custom_data, Some(json!({ "basket": 3 })));
    let request = report.request.as_ref().expect("request detail");
    assert_eq!(request.http_method, "GET");
    assert_eq!(request.query_string.get("attempt").map(String::as_str), Some("2"));
    assert_eq!(
        request.headers.get("authorization").map(String::as_str),
        Some("[redacted]")
    );
}

#[rstest]
#[actix_rt::test]
async fn reported_traces_start_outside_the_reporter(transport: RecordingTransport) {
    let app = init_app(manager(ReporterOptions::builder().build(), &transport)).await;

    let res = test::call_service(&app, TestRequest::get().uri("/fail").to_request()).await;

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let reports = transport.reports();
    let trace = &reports.first().expect("one report").error.stack_trace;
    let first = trace.frames().first().expect("captured frames");
    assert!(
        !is_reporter_frame(first),
        "trace should start outside the reporter, got {first}"
    );
    assert!(
        !trace.frames().iter().any(is_reporter_frame),
        "no reporter frame should remain:\n{trace}"
    );
}

#[rstest]
#[actix_rt::test]
async fn panics_are_recovered_and_reported(transport: RecordingTransport) {
    let app = init_app(manager(ReporterOptions::builder().build(), &transport)).await;

    let error = test::try_call_service(&app, TestRequest::get().uri("/panic").to_request())
        .await
        .expect_err("the panic comes back as an error");

    assert_eq!(
        error.as_response_error().status_code(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
    let recovered = error
        .as_error::<RecoveredPanic>()
        .expect("error should be the recovered panic");
    assert_eq!(recovered.message(), "boom");
    assert!(!recovered.is_reported(), "plain Recover does not report");

    let reports = transport.reports();
    assert_eq!(reports.len(), 1);
    let report = reports.first().expect("one report");
    assert_eq!(report.error.message, "boom");
    assert_eq!(report.error.class_name, "panic");
    assert_eq!(report.response_status, Some(500));
    assert!(
        report
            .request
            .as_ref()
            .is_some_and(|detail| detail.url.ends_with("/panic")),
        "request detail comes from the snapshot taken before routing"
    );
    assert_eq!(report.error.stack_trace, *recovered.stack_trace());
    let first = report
        .error
        .stack_trace
        .frames()
        .first()
        .expect("panic site frame");
    assert!(
        first.to_string().contains("exploding_handler"),
        "trace should start in the handler, got {first}"
    );
}

#[rstest]
#[actix_rt::test]
async fn reporting_recover_and_notify_submit_each_panic_once(transport: RecordingTransport) {
    let reporter = manager(ReporterOptions::builder().build(), &transport);
    let app = init_app_with(Recover::reporting(reporter.clone()), reporter).await;

    let error = test::try_call_service(&app, TestRequest::get().uri("/panic").to_request())
        .await
        .expect_err("the panic comes back as an error");

    assert!(
        error
            .as_error::<RecoveredPanic>()
            .is_some_and(RecoveredPanic::is_reported)
    );
    assert_eq!(transport.reports().len(), 1, "the panic is reported once");
}

#[rstest]
#[actix_rt::test]
async fn custom_skip_policy_overrides_status(transport: RecordingTransport) {
    let options = ReporterOptions::builder()
        .skip_policy(|_: Option<&HttpRequest>, _: &actix_raygun::domain::Failure| false)
        .build();
    let app = init_app(manager(options, &transport)).await;

    let res = test::call_service(&app, TestRequest::get().uri("/missing").to_request()).await;

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let reports = transport.reports();
    assert_eq!(reports.len(), 1, "policy asked for the 404 to be reported");
    assert_eq!(
        reports.first().and_then(|report| report.response_status),
        Some(404)
    );
}

#[actix_rt::test]
async fn silent_mode_returns_original_error_without_submission() {
    let transport = RecordingTransport::failing(ReportTransportError::transport("unreachable"));
    let options = ReporterOptions::builder().silent(true).build();
    let app = init_app(manager(options, &transport)).await;

    let res = test::call_service(&app, TestRequest::get().uri("/fail").to_request()).await;

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let error = res.response().error().expect("original error is preserved");
    assert_eq!(error.to_string(), "ledger offline");
    assert!(transport.reports().is_empty());
}

#[actix_rt::test]
#[should_panic(expected = "report transport failed: connection reset")]
async fn failing_submission_escalates() {
    let transport = RecordingTransport::failing(ReportTransportError::transport("connection reset"));
    let app = init_app(manager(ReporterOptions::builder().build(), &transport)).await;

    test::call_service(&app, TestRequest::get().uri("/fail").to_request()).await;
}
