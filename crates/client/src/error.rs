//! Typed error enum for the REST client.

use adoption_insights_core::FetchError;
use thiserror::Error;

/// Errors from insight API requests.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),
    #[error("HTTP status 401: Authentication required ({body})")]
    Unauthorized { body: String },
    #[error("HTTP status {code}: {body}")]
    HttpStatus { code: u16, body: String },
    #[error("JSON parse error in {context}: {source}")]
    JsonParse {
        context: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid base URL: {0}")]
    InvalidUrl(String),
    #[error("client initialization failed: {0}")]
    ClientInit(String),
}

impl ClientError {
    /// Whether the backend rejected the credential.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Whether this error is transient and a later attempt may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpRequest(_) => true,
            Self::HttpStatus { code, .. } => matches!(code, 429 | 500 | 502 | 503 | 504),
            _ => false,
        }
    }
}

impl From<ClientError> for FetchError {
    fn from(err: ClientError) -> Self {
        Self::new(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_maps_to_auth_fetch_error() {
        let err = ClientError::Unauthorized { body: "expired".to_owned() };
        assert!(err.is_unauthorized());
        assert!(!err.is_transient());
        let fetch: FetchError = err.into();
        assert!(fetch.is_auth_failure());
    }

    #[test]
    fn test_status_errors() {
        let err = ClientError::HttpStatus { code: 503, body: "down".to_owned() };
        assert!(err.is_transient());
        let fetch: FetchError = err.into();
        assert!(!fetch.is_auth_failure());
        assert_eq!(fetch.message(), "HTTP status 503: down");
    }
}
