//! Domain types for crash reporting.
//!
//! Purpose: describe failures and reports without reference to the web
//! framework or the transport. Adapters translate at the edges.
//!
//! Public surface:
//! - `Failure`: one failure offered for reporting.
//! - `Report` and its sections: the payload handed to `ReportTransport`.
//! - `StackTrace` and `StackFrame`: captured call stacks.
//! - `ApiKey`: validated, zeroising application key.

mod api_key;
mod failure;
pub mod ports;
mod report;
mod stack_trace;

pub use self::api_key::{ApiKey, ApiKeyValidationError};
pub use self::failure::{Failure, INTERNAL_SERVER_ERROR};
pub use self::report::{
    ClientIdentity, ErrorDetail, Report, ReportExtras, RequestDetail, UserIdentity,
};
pub use self::stack_trace::{StackFrame, StackTrace};
