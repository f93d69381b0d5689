//! Network tests for the reqwest-backed Raygun transport.

use std::time::Duration;

use actix_raygun::RaygunTransportSettings;
use actix_raygun::domain::ports::{ReportTransport, ReportTransportError};
use actix_raygun::domain::{
    ApiKey, ClientIdentity, ErrorDetail, Report, StackFrame, StackTrace,
};
use actix_raygun::outbound::raygun::RaygunHttpTransport;
use chrono::Utc;
use mockito::{Matcher, Server};
use reqwest::Url;
use rstest::{fixture, rstest};
use serde_json::json;

#[fixture]
fn report() -> Report {
    Report {
        occurred_on: Utc::now(),
        machine_name: Some("worker-3".to_owned()),
        version: Some("0.9.1".to_owned()),
        error: ErrorDetail {
            message: "ledger offline".to_owned(),
            class_name: "StoreError".to_owned(),
            stack_trace: StackTrace::new(vec![StackFrame::from_symbol(
                "shop::ledger::post",
                Some("src/ledger.rs".to_owned()),
                Some(88),
            )]),
        },
        request: None,
        response_status: Some(500),
        user_custom_data: None,
        tags: vec!["billing".to_owned()],
        user: None,
        client: ClientIdentity::current(),
    }
}

fn api_key() -> ApiKey {
    ApiKey::try_new("transport-key").expect("valid key")
}

fn transport_for(server: &Server) -> RaygunHttpTransport {
    let endpoint = Url::parse(&format!("{}/entries", server.url())).expect("mock server URL");
    let settings = RaygunTransportSettings {
        endpoint,
        timeout: Duration::from_secs(5),
    };
    RaygunHttpTransport::new(settings).expect("client should build")
}

#[rstest]
#[tokio::test]
async fn posts_json_entry_with_api_key(report: Report) {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/entries")
        .match_header("x-apikey", "transport-key")
        .match_header("content-type", "application/json")
        .match_body(Matcher::PartialJson(json!({
            "details": {
                "machineName": "worker-3",
                "version": "0.9.1",
                "error": {
                    "message": "ledger offline",
                    "className": "StoreError",
                    "stackTrace": [{
                        "lineNumber": 88,
                        "className": "shop::ledger",
                        "fileName": "src/ledger.rs",
                        "methodName": "post",
                    }],
                },
                "response": { "statusCode": 500 },
                "tags": ["billing"],
                "client": { "name": "actix-raygun" },
            }
        })))
        .with_status(202)
        .create_async()
        .await;

    let result = transport_for(&server).submit(&report, &api_key()).await;

    assert_eq!(result, Ok(()));
    mock.assert_async().await;
}

#[rstest]
#[case::forbidden(403, ReportTransportError::unauthorized("status 403: invalid key"))]
#[case::too_large(413, ReportTransportError::rejected("status 413: invalid key"))]
#[case::rate_limited(429, ReportTransportError::rate_limited("status 429: invalid key"))]
#[tokio::test]
async fn maps_rejections_to_port_errors(
    report: Report,
    #[case] status: usize,
    #[case] expected: ReportTransportError,
) {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/entries")
        .with_status(status)
        .with_body("invalid key")
        .create_async()
        .await;

    let result = transport_for(&server).submit(&report, &api_key()).await;

    assert_eq!(result, Err(expected));
    mock.assert_async().await;
}

#[rstest]
#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error(report: Report) {
    let settings = RaygunTransportSettings::with_endpoint(
        Url::parse("http://127.0.0.1:9/entries").expect("static URL"),
    );
    let transport = RaygunHttpTransport::new(settings).expect("client should build");

    let error = transport
        .submit(&report, &api_key())
        .await
        .expect_err("nothing listens on the discard port");

    assert!(
        matches!(
            error,
            ReportTransportError::Transport { .. } | ReportTransportError::Timeout { .. }
        ),
        "connection failures should map to Transport, got {error:?}",
    );
}
