//! Framework-neutral description of one failed request.

use std::any::type_name;

use super::StackTrace;

/// HTTP status treated as a server fault by the default skip rule.
pub const INTERNAL_SERVER_ERROR: u16 = 500;

/// A failure offered for reporting.
///
/// Carries the error text, a class name for grouping, the response status when
/// the error exposes one, and a stack trace when one was captured at the
/// failure site (recovered panics carry theirs).
///
/// # Examples
/// ```
/// use actix_raygun::domain::Failure;
///
/// let failure = Failure::new("database unavailable").with_status(503);
/// assert_eq!(failure.message(), "database unavailable");
/// assert_eq!(failure.status(), Some(503));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    message: String,
    class_name: String,
    status: Option<u16>,
    stack_trace: Option<StackTrace>,
}

impl Failure {
    /// Create a failure from a bare message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            class_name: "Error".to_owned(),
            status: None,
            stack_trace: None,
        }
    }

    /// Create a failure from any error value, using its type name as class.
    pub fn from_error<E>(error: &E) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        Self {
            message: error.to_string(),
            class_name: type_name::<E>().to_owned(),
            status: None,
            stack_trace: None,
        }
    }

    /// Attach the HTTP status the error maps to.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Override the class name used to group reports.
    #[must_use]
    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = class_name.into();
        self
    }

    /// Attach a trace captured at the failure site.
    #[must_use]
    pub fn with_stack_trace(mut self, stack_trace: StackTrace) -> Self {
        self.stack_trace = Some(stack_trace);
        self
    }

    /// Human-readable error text.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Class name used to group reports.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Response status exposed by the error, if any.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Trace captured at the failure site, if any.
    pub fn stack_trace(&self) -> Option<&StackTrace> {
        self.stack_trace.as_ref()
    }

    /// Default reportability rule: errors exposing a status are only
    /// reported when that status is 500; errors without one always are.
    pub fn is_server_fault(&self) -> bool {
        self.status.is_none_or(|status| status == INTERNAL_SERVER_ERROR)
    }

    pub(crate) fn into_parts(self) -> (String, String, Option<StackTrace>) {
        (self.message, self.class_name, self.stack_trace)
    }
}
