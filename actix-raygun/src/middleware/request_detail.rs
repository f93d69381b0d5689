//! Snapshot of an actix request for the report's request and user sections.

use std::collections::BTreeMap;

use actix_web::HttpRequest;
use actix_web::http::uri::PathAndQuery;

use crate::config::ReporterOptions;
use crate::domain::{RequestDetail, UserIdentity};

const REDACTED: &str = "[redacted]";

/// Request data a report needs, copied out before the request is handed to
/// the inner service.
///
/// Middleware must not hold on to the `HttpRequest` itself while routing runs,
/// so failures that come back without a request are described from this copy.
#[derive(Debug, Clone)]
pub(crate) struct RequestSnapshot {
    pub(crate) detail: RequestDetail,
    pub(crate) user: Option<UserIdentity>,
}

impl RequestSnapshot {
    pub(crate) fn capture(request: &HttpRequest, options: &ReporterOptions) -> Self {
        Self {
            detail: request_detail(request, options),
            user: resolve_user(request, options),
        }
    }
}

/// Identify the affected user with the configured resolver.
fn resolve_user(request: &HttpRequest, options: &ReporterOptions) -> Option<UserIdentity> {
    options
        .user_resolver()
        .and_then(|resolver| resolver.resolve_user(request))
        .map(|identifier| UserIdentity { identifier })
}

/// Copy method, URL, client address, query and headers out of `request`.
///
/// Repeated headers are joined with `", "`. Headers listed in the options'
/// redaction set keep their name but lose their value.
fn request_detail(request: &HttpRequest, options: &ReporterOptions) -> RequestDetail {
    let connection = request.connection_info();
    let path = request
        .uri()
        .path_and_query()
        .map_or("/", PathAndQuery::as_str);

    let query_string = url::form_urlencoded::parse(request.query_string().as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in request.headers() {
        let value = if options.is_redacted_header(name.as_str()) {
            REDACTED.to_owned()
        } else {
            String::from_utf8_lossy(value.as_bytes()).into_owned()
        };
        headers
            .entry(name.as_str().to_owned())
            .and_modify(|existing| {
                if existing != REDACTED {
                    existing.push_str(", ");
                    existing.push_str(&value);
                }
            })
            .or_insert(value);
    }

    RequestDetail {
        host_name: connection.host().to_owned(),
        url: format!("{}://{}{}", connection.scheme(), connection.host(), path),
        http_method: request.method().to_string(),
        ip_address: connection.realip_remote_addr().map(str::to_owned),
        query_string,
        headers,
    }
}
