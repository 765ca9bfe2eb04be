use thiserror::Error;

/// Errors raised synchronously by misconfiguration, before any network call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Unknown entity type: {0} (expected organization|project|user)")]
    UnknownEntityType(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
}

/// Message substrings that mark a fetch failure as an authentication failure.
pub const AUTH_FAILURE_MARKERS: &[&str] = &["Token has expired", "Authentication required", "401"];

/// Failure reported by an [`InsightFetcher`](crate::InsightFetcher).
///
/// Carries only a message: the loader surfaces it verbatim in
/// [`ServiceState::error`](crate::ServiceState::error). Authentication
/// failures are recognised by message content, not by type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct FetchError {
    message: String,
}

impl FetchError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the message matches a known expiry/auth-required pattern.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        is_auth_failure_message(&self.message)
    }
}

impl From<String> for FetchError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for FetchError {
    fn from(message: &str) -> Self {
        Self { message: message.to_owned() }
    }
}

#[must_use]
pub fn is_auth_failure_message(message: &str) -> bool {
    AUTH_FAILURE_MARKERS.iter().any(|marker| message.contains(marker))
}

pub type Result<T> = std::result::Result<T, CoreError>;
