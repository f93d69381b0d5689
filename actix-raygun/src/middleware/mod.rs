//! Request middleware.
//!
//! Purpose: intercept panics and failed responses in the actix pipeline and
//! forward them to the reporter.
//!
//! Recommended order: `Recover` innermost, `Notify` wrapping it, so recovered
//! panics reach `Notify` as ordinary 500 errors returned by the inner service.

pub mod notify;
pub mod recover;
pub mod report_context;
pub(crate) mod request_detail;

pub use notify::{Notify, failure_from_error};
pub use recover::{Recover, RecoveredPanic};
pub use report_context::ReportContextExt;
