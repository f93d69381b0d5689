//! Crash report aggregate handed to the transport port.
//!
//! A [`Report`] is built once per reportable failure, submitted once, then
//! dropped. Nothing here is persisted.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::StackTrace;

/// Error section of a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetail {
    /// Error text.
    pub message: String,
    /// Grouping class, usually the Rust type name of the error.
    pub class_name: String,
    /// Frames ordered most recent first.
    pub stack_trace: StackTrace,
}

/// Snapshot of the HTTP request that failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestDetail {
    /// Host the request was addressed to.
    pub host_name: String,
    /// Absolute request URL including the query string.
    pub url: String,
    /// HTTP method, e.g. `GET`.
    pub http_method: String,
    /// Client address, honouring forwarding headers.
    pub ip_address: Option<String>,
    /// Decoded query parameters.
    pub query_string: BTreeMap<String, String>,
    /// Request headers keyed by lowercase name, sensitive values redacted.
    pub headers: BTreeMap<String, String>,
}

/// Identified user affected by the failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    /// Application-defined user identifier.
    pub identifier: String,
}

/// Reporting client identity sent with every report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIdentity {
    /// Client library name.
    pub name: &'static str,
    /// Client library semantic version.
    pub version: &'static str,
    /// Client library homepage.
    pub client_url: &'static str,
}

impl ClientIdentity {
    /// Identity of this crate, fixed at compile time.
    ///
    /// # Examples
    /// ```
    /// use actix_raygun::domain::ClientIdentity;
    ///
    /// let client = ClientIdentity::current();
    /// assert_eq!(client.name, "actix-raygun");
    /// ```
    pub const fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            client_url: env!("CARGO_PKG_REPOSITORY"),
        }
    }
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self::current()
    }
}

/// Caller-supplied report data: tags and arbitrary custom payload.
///
/// # Examples
/// ```
/// use actix_raygun::domain::ReportExtras;
/// use serde_json::json;
///
/// let extras = ReportExtras::default()
///     .with_tag("checkout")
///     .with_custom_data(json!({ "cart": 42 }));
/// assert_eq!(extras.tags, vec!["checkout".to_owned()]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportExtras {
    /// Free-form tags used for filtering in Raygun.
    pub tags: Vec<String>,
    /// Arbitrary payload, typically the request body or handler state.
    pub custom_data: Option<Value>,
}

impl ReportExtras {
    /// Append one tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Replace the custom payload.
    #[must_use]
    pub fn with_custom_data(mut self, custom_data: Value) -> Self {
        self.custom_data = Some(custom_data);
        self
    }
}

/// One failure, formatted for the error-reporting service.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// When the report was built.
    pub occurred_on: DateTime<Utc>,
    /// Host name of the reporting machine.
    pub machine_name: Option<String>,
    /// Version label of the monitored application.
    pub version: Option<String>,
    /// Error message, class and trace.
    pub error: ErrorDetail,
    /// Originating request; absent for failures reported outside a request.
    pub request: Option<RequestDetail>,
    /// Response status the failure maps to.
    pub response_status: Option<u16>,
    /// Arbitrary user payload.
    pub user_custom_data: Option<Value>,
    /// Report tags.
    pub tags: Vec<String>,
    /// Affected user, when one could be resolved from the request.
    pub user: Option<UserIdentity>,
    /// Identity of this client library.
    pub client: ClientIdentity,
}
