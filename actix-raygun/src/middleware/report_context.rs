//! Per-request report data attached by handlers.
//!
//! Handlers record custom data and tags on the request; [`Notify`] picks them
//! up when the request fails. Data lives in the request extensions behind a
//! shared handle, so the middleware can read it after the request itself has
//! been consumed by the inner service.
//!
//! [`Notify`]: crate::middleware::Notify

use std::cell::RefCell;
use std::rc::Rc;

use actix_web::HttpMessage;
use serde_json::Value;

use crate::domain::ReportExtras;

/// Shared handle to the report data of one request.
#[derive(Debug, Clone, Default)]
pub(crate) struct ReportContext(Rc<RefCell<ReportExtras>>);

impl ReportContext {
    /// Handle to the report data of `message`, created on first use.
    pub(crate) fn attach<T: HttpMessage>(message: &T) -> Self {
        let mut extensions = message.extensions_mut();
        if let Some(context) = extensions.get::<Self>() {
            return context.clone();
        }
        let context = Self::default();
        extensions.insert(context.clone());
        context
    }

    /// Data recorded so far.
    pub(crate) fn extras(&self) -> ReportExtras {
        self.0.borrow().clone()
    }
}

/// Extension methods for attaching report data to a request.
///
/// # Examples
/// ```
/// use actix_raygun::middleware::ReportContextExt;
/// use actix_web::{HttpRequest, HttpResponse};
/// use serde_json::json;
///
/// async fn checkout(req: HttpRequest) -> HttpResponse {
///     req.report_tag("checkout");
///     req.report_custom_data(json!({ "basket": 3 }));
///     HttpResponse::Ok().finish()
/// }
/// ```
pub trait ReportContextExt {
    /// Replace the custom payload sent with a report for this request.
    fn report_custom_data(&self, data: Value);

    /// Add a tag to any report raised for this request.
    fn report_tag(&self, tag: impl Into<String>);

    /// Data recorded so far.
    fn report_extras(&self) -> ReportExtras;
}

impl<T> ReportContextExt for T
where
    T: HttpMessage,
{
    fn report_custom_data(&self, data: Value) {
        ReportContext::attach(self).0.borrow_mut().custom_data = Some(data);
    }

    fn report_tag(&self, tag: impl Into<String>) {
        ReportContext::attach(self).0.borrow_mut().tags.push(tag.into());
    }

    fn report_extras(&self) -> ReportExtras {
        self.extensions()
            .get::<ReportContext>()
            .map(ReportContext::extras)
            .unwrap_or_default()
    }
}
