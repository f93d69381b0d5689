//! Reqwest-backed Raygun transport adapter.
//!
//! This adapter owns transport details only: payload encoding, timeout and
//! HTTP error mapping. Report content is decided by the domain.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};

use super::dto::RaygunEntryDto;
use crate::domain::ports::{ReportTransport, ReportTransportError};
use crate::domain::{ApiKey, Report};

/// Raygun ingestion endpoint used unless overridden.
pub const DEFAULT_ENDPOINT: &str = "https://api.raygun.com/entries";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const API_KEY_HEADER: &str = "X-ApiKey";

/// Endpoint and timeout for the Raygun HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaygunTransportSettings {
    /// Entries endpoint reports are posted to.
    pub endpoint: Url,
    /// Whole-request timeout applied by the HTTP client.
    pub timeout: Duration,
}

impl RaygunTransportSettings {
    /// Settings pointing at `endpoint` with the default timeout.
    ///
    /// # Examples
    /// ```
    /// use actix_raygun::outbound::raygun::RaygunTransportSettings;
    /// use reqwest::Url;
    ///
    /// let endpoint = Url::parse("http://127.0.0.1:9000/entries").unwrap();
    /// let settings = RaygunTransportSettings::with_endpoint(endpoint.clone());
    /// assert_eq!(settings.endpoint, endpoint);
    /// ```
    #[must_use]
    pub const fn with_endpoint(endpoint: Url) -> Self {
        Self {
            endpoint,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl Default for RaygunTransportSettings {
    fn default() -> Self {
        #[expect(clippy::expect_used, reason = "the default endpoint is a constant URL")]
        let endpoint = Url::parse(DEFAULT_ENDPOINT).expect("default Raygun endpoint parses");
        Self::with_endpoint(endpoint)
    }
}

/// Report transport that POSTs JSON entries to Raygun.
pub struct RaygunHttpTransport {
    client: Client,
    endpoint: Url,
}

impl RaygunHttpTransport {
    /// Build a transport using a reqwest client with the configured timeout.
    /// ```rust,ignore
    /// let transport = RaygunHttpTransport::new(RaygunTransportSettings::default());
    /// assert!(transport.is_ok() || transport.is_err());
    /// ```
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(settings: RaygunTransportSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            client,
            endpoint: settings.endpoint,
        })
    }
}

impl std::fmt::Debug for RaygunHttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaygunHttpTransport")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ReportTransport for RaygunHttpTransport {
    async fn submit(&self, report: &Report, api_key: &ApiKey) -> Result<(), ReportTransportError> {
        let payload = encode_report(report)?;
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(API_KEY_HEADER, api_key.expose())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let error_body = response.bytes().await.map_err(map_transport_error)?;
        Err(map_status_error(status, error_body.as_ref()))
    }
}

fn encode_report(report: &Report) -> Result<Vec<u8>, ReportTransportError> {
    serde_json::to_vec(&RaygunEntryDto::from(report)).map_err(|error| {
        ReportTransportError::encode(format!("invalid Raygun payload: {error}"))
    })
}

fn map_transport_error(error: reqwest::Error) -> ReportTransportError {
    if error.is_timeout() {
        ReportTransportError::timeout(error.to_string())
    } else {
        ReportTransportError::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> ReportTransportError {
    let body_preview = body_preview(body);
    let message = if body_preview.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {}", status.as_u16(), body_preview)
    };

    match status {
        StatusCode::TOO_MANY_REQUESTS => ReportTransportError::rate_limited(message),
        StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => {
            ReportTransportError::unauthorized(message)
        }
        StatusCode::BAD_REQUEST | StatusCode::PAYLOAD_TOO_LARGE => {
            ReportTransportError::rejected(message)
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            ReportTransportError::timeout(message)
        }
        _ => ReportTransportError::transport(message),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}
