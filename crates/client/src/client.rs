use std::sync::Arc;
use std::time::Duration;

use adoption_insights_core::constants::{
    DEFAULT_API_URL, DEFAULT_HTTP_TIMEOUT_SECS, ENV_API_URL, ENV_HTTP_TIMEOUT_SECS,
};
use adoption_insights_core::{
    env_parse_with_default, env_string, CredentialStore, EntityType, FetchError, Filters,
    InsightFetcher, MemoryCredentialStore, Page, PageRange,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::credentials::credentials_from_env;
use crate::error::ClientError;
use crate::wire::PageBody;

/// Maximum body length echoed back in error messages.
pub const MAX_ERROR_BODY_LEN: usize = 500;

/// REST client for the paginated insight endpoints.
pub struct InsightsClient {
    pub(crate) client: reqwest::Client,
    pub(crate) base_url: String,
    pub(crate) credentials: Arc<dyn CredentialStore>,
}

impl std::fmt::Debug for InsightsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsightsClient")
            .field("client", &self.client)
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials.get().map(|_| "***"))
            .finish()
    }
}

impl InsightsClient {
    /// Creates a client for `base_url` with no stored credential.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built (TLS backend failure).
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_credentials(
            base_url,
            Arc::new(MemoryCredentialStore::default()),
            Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        )
    }

    /// Creates a client reading its bearer token from `credentials`.
    ///
    /// # Errors
    /// Returns an error if `base_url` is blank or the HTTP client cannot be built.
    pub fn with_credentials(
        base_url: &str,
        credentials: Arc<dyn CredentialStore>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let base_url = base_url.trim().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            return Err(ClientError::InvalidUrl("base URL is empty".to_owned()));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::ClientInit(e.to_string()))?;
        Ok(Self { client, base_url, credentials })
    }

    /// Builds a client from `INSIGHTS_API_URL`, `INSIGHTS_API_TOKEN` and
    /// `INSIGHTS_HTTP_TIMEOUT_SECS`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_env() -> Result<Self, ClientError> {
        let base_url = env_string(ENV_API_URL).unwrap_or_else(|| DEFAULT_API_URL.to_owned());
        let timeout = env_parse_with_default(ENV_HTTP_TIMEOUT_SECS, DEFAULT_HTTP_TIMEOUT_SECS);
        Self::with_credentials(
            &base_url,
            Arc::new(credentials_from_env()),
            Duration::from_secs(timeout),
        )
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    #[must_use]
    pub fn endpoint_url(&self, entity: EntityType) -> String {
        format!("{}/api/insights/{}", self.base_url, entity.endpoint())
    }

    /// Fetches the rows `range` of `entity` matching `filters`.
    ///
    /// A 401 response clears the credential store before returning
    /// [`ClientError::Unauthorized`].
    ///
    /// # Errors
    /// Returns an error if the request fails, the backend returns a
    /// non-success status, or the body cannot be decoded.
    pub async fn fetch_page<T: DeserializeOwned>(
        &self,
        entity: EntityType,
        filters: &Filters,
        range: PageRange,
    ) -> Result<Page<T>, ClientError> {
        let mut query = filters.query_pairs();
        query.push(("start".to_owned(), range.start.to_string()));
        query.push(("end".to_owned(), range.end.to_string()));

        let mut request = self.client.get(self.endpoint_url(entity)).query(&query);
        if let Some(token) = self.credentials.get() {
            request = request.bearer_auth(token);
        }

        tracing::debug!(%entity, start = range.start, end = range.end, "fetching insight page");
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            tracing::warn!(%entity, "backend rejected credential, clearing stored token");
            self.credentials.clear();
            return Err(ClientError::Unauthorized {
                body: truncate(&body, MAX_ERROR_BODY_LEN).to_owned(),
            });
        }
        if !status.is_success() {
            return Err(ClientError::HttpStatus {
                code: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY_LEN).to_owned(),
            });
        }

        let parsed: PageBody<T> = serde_json::from_str(&body).map_err(|e| ClientError::JsonParse {
            context: format!("{entity} page (body: {})", truncate(&body, 200)),
            source: e,
        })?;
        Ok(parsed.into_page())
    }
}

#[async_trait]
impl<T> InsightFetcher<T> for InsightsClient
where
    T: DeserializeOwned + Send + 'static,
{
    async fn fetch(
        &self,
        entity: EntityType,
        filters: &Filters,
        range: PageRange,
    ) -> Result<Page<T>, FetchError> {
        Ok(self.fetch_page(entity, filters, range).await?)
    }
}

/// Truncates a string to the given maximum length at a char boundary.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        s
    } else {
        let mut end = max_len;
        while end > 0 && !s.is_char_boundary(end) {
            end = end.saturating_sub(1);
        }
        s.get(..end).unwrap_or("")
    }
}
