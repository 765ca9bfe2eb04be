//! Shared constants for adoption-insights.

/// Rows requested per page when not configured.
pub const DEFAULT_BATCH_SIZE: usize = 5000;

/// Delay between background page fetches, in milliseconds.
pub const DEFAULT_BATCH_DELAY_MS: u64 = 10_000;

/// Auto-refresh period, in milliseconds (5 minutes).
pub const DEFAULT_AUTO_REFRESH_MS: u64 = 300_000;

/// HTTP request timeout for the REST client, in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Backend used by the CLI when `INSIGHTS_API_URL` is unset.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

pub const ENV_BATCH_SIZE: &str = "INSIGHTS_BATCH_SIZE";
pub const ENV_BATCH_DELAY_MS: &str = "INSIGHTS_BATCH_DELAY_MS";
pub const ENV_AUTO_REFRESH_MS: &str = "INSIGHTS_AUTO_REFRESH_MS";
pub const ENV_API_URL: &str = "INSIGHTS_API_URL";
pub const ENV_API_TOKEN: &str = "INSIGHTS_API_TOKEN";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "INSIGHTS_HTTP_TIMEOUT_SECS";
