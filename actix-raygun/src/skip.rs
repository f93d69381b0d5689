//! Skip policy deciding whether a failure is worth reporting.
//!
//! Evaluation order:
//! 1. A configured [`SkipPolicy`] is authoritative.
//! 2. Otherwise errors exposing a response status are skipped unless the
//!    status is 500.
//! 3. Otherwise the failure is reported.
//!
//! The decision is stateless and made once per failure.

use actix_web::HttpRequest;

use crate::config::ReporterOptions;
use crate::domain::Failure;

/// Strategy deciding whether a failure should be left unreported.
///
/// Closures with the matching signature implement this trait.
///
/// # Examples
/// ```
/// use actix_raygun::{ReporterOptions, domain::Failure};
/// use actix_web::HttpRequest;
///
/// let options = ReporterOptions::builder()
///     .skip_policy(|_request: Option<&HttpRequest>, failure: &Failure| {
///         failure.message().contains("client closed")
///     })
///     .build();
/// assert!(options.skip_policy().is_some());
/// ```
pub trait SkipPolicy: Send + Sync {
    /// Return `true` to leave `failure` unreported.
    fn should_skip(&self, request: Option<&HttpRequest>, failure: &Failure) -> bool;
}

impl<F> SkipPolicy for F
where
    F: Fn(Option<&HttpRequest>, &Failure) -> bool + Send + Sync,
{
    fn should_skip(&self, request: Option<&HttpRequest>, failure: &Failure) -> bool {
        self(request, failure)
    }
}

/// Apply the configured policy, falling back to the server-fault rule.
pub fn should_skip(
    request: Option<&HttpRequest>,
    options: &ReporterOptions,
    failure: &Failure,
) -> bool {
    match options.skip_policy() {
        Some(policy) => policy.should_skip(request, failure),
        None => !failure.is_server_fault(),
    }
}
