//! Raygun application API key.

use std::fmt;

use zeroize::Zeroizing;

/// Validation failures raised when constructing an [`ApiKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ApiKeyValidationError {
    /// The key was empty or whitespace.
    #[error("api key must not be empty")]
    Empty,
}

/// Application API key sent with every submission.
///
/// ## Invariants
/// - The key is trimmed and non-empty.
/// - The key is wiped from memory on drop and never printed by `Debug`.
///
/// # Examples
/// ```
/// use actix_raygun::domain::ApiKey;
///
/// let key = ApiKey::try_new(" abc123 ").unwrap();
/// assert_eq!(key.expose(), "abc123");
/// assert_eq!(format!("{key:?}"), "ApiKey([redacted])");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(Zeroizing<String>);

impl ApiKey {
    /// Validate and wrap a raw key.
    pub fn try_new(raw: &str) -> Result<Self, ApiKeyValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ApiKeyValidationError::Empty);
        }
        Ok(Self(Zeroizing::new(trimmed.to_owned())))
    }

    /// Raw key for the transport header.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey([redacted])")
    }
}

impl std::str::FromStr for ApiKey {
    type Err = ApiKeyValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_new(s)
    }
}
