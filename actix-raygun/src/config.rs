//! Reporter configuration.
//!
//! Options are assembled with [`ReporterOptionsBuilder`] at startup and frozen
//! behind an `Arc`. Every request reads the same snapshot; nothing mutates it
//! afterwards, so no locking is involved.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use actix_web::HttpRequest;

use crate::skip::SkipPolicy;

/// Frames a panic hook trace starts with: the capture function and the hook
/// closure that called it.
pub const DEFAULT_SKIP_FRAMES: usize = 2;

/// Header names whose values never leave the process.
pub const DEFAULT_REDACTED_HEADERS: &[&str] = &["authorization", "cookie", "x-apikey"];

/// Strategy resolving the affected user's identifier from a request.
///
/// Closures with the matching signature implement this trait.
pub trait UserResolver: Send + Sync {
    /// Return the identifier of the user making `request`, if known.
    fn resolve_user(&self, request: &HttpRequest) -> Option<String>;
}

impl<F> UserResolver for F
where
    F: Fn(&HttpRequest) -> Option<String> + Send + Sync,
{
    fn resolve_user(&self, request: &HttpRequest) -> Option<String> {
        self(request)
    }
}

/// Immutable reporter configuration shared by all requests.
#[derive(Clone)]
pub struct ReporterOptions {
    version: Option<String>,
    silent: bool,
    skip_policy: Option<Arc<dyn SkipPolicy>>,
    user_resolver: Option<Arc<dyn UserResolver>>,
    skip_frames: usize,
    redacted_headers: BTreeSet<String>,
}

impl ReporterOptions {
    /// Start building options from the defaults.
    ///
    /// # Examples
    /// ```
    /// use actix_raygun::ReporterOptions;
    ///
    /// let options = ReporterOptions::builder()
    ///     .version("2.4.1")
    ///     .silent(true)
    ///     .build();
    /// assert_eq!(options.version(), Some("2.4.1"));
    /// assert!(options.is_silent());
    /// ```
    pub fn builder() -> ReporterOptionsBuilder {
        ReporterOptionsBuilder::default()
    }

    /// Version label of the monitored application.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Whether reports are printed locally instead of being sent.
    pub fn is_silent(&self) -> bool {
        self.silent
    }

    /// Custom skip policy, if configured.
    pub fn skip_policy(&self) -> Option<&dyn SkipPolicy> {
        self.skip_policy.as_deref()
    }

    /// Custom user resolver, if configured.
    pub fn user_resolver(&self) -> Option<&dyn UserResolver> {
        self.user_resolver.as_deref()
    }

    /// Caller frames dropped from traces captured at report time.
    ///
    /// The reporter's own frames are always removed first; this count only
    /// covers application helpers wrapping [`Manager`](crate::Manager).
    pub fn skip_frames(&self) -> usize {
        self.skip_frames
    }

    /// Whether the value of header `name` must be redacted.
    pub fn is_redacted_header(&self, name: &str) -> bool {
        self.redacted_headers.contains(&name.to_ascii_lowercase())
    }
}

impl Default for ReporterOptions {
    fn default() -> Self {
        Self {
            version: None,
            silent: false,
            skip_policy: None,
            user_resolver: None,
            skip_frames: 0,
            redacted_headers: DEFAULT_REDACTED_HEADERS
                .iter()
                .map(|name| (*name).to_owned())
                .collect(),
        }
    }
}

impl fmt::Debug for ReporterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReporterOptions")
            .field("version", &self.version)
            .field("silent", &self.silent)
            .field("skip_policy", &self.skip_policy.is_some())
            .field("user_resolver", &self.user_resolver.is_some())
            .field("skip_frames", &self.skip_frames)
            .field("redacted_headers", &self.redacted_headers)
            .finish()
    }
}

/// Builder for [`ReporterOptions`].
#[derive(Default)]
pub struct ReporterOptionsBuilder {
    options: ReporterOptions,
}

impl ReporterOptionsBuilder {
    /// Set the application version label.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.options.version = Some(version.into());
        self
    }

    /// Print reports to stdout instead of sending them.
    #[must_use]
    pub fn silent(mut self, silent: bool) -> Self {
        self.options.silent = silent;
        self
    }

    /// Replace the default server-fault rule with a custom policy.
    #[must_use]
    pub fn skip_policy<P>(mut self, policy: P) -> Self
    where
        P: SkipPolicy + 'static,
    {
        self.options.skip_policy = Some(Arc::new(policy));
        self
    }

    /// Resolve the affected user from each failing request.
    #[must_use]
    pub fn user_resolver<R>(mut self, resolver: R) -> Self
    where
        R: UserResolver + 'static,
    {
        self.options.user_resolver = Some(Arc::new(resolver));
        self
    }

    /// Number of caller frames dropped from traces captured at report time.
    #[must_use]
    pub fn skip_frames(mut self, count: usize) -> Self {
        self.options.skip_frames = count;
        self
    }

    /// Redact the value of one more header.
    #[must_use]
    pub fn redact_header(mut self, name: &str) -> Self {
        self.options
            .redacted_headers
            .insert(name.to_ascii_lowercase());
        self
    }

    /// Freeze the options.
    pub fn build(self) -> Arc<ReporterOptions> {
        Arc::new(self.options)
    }
}
