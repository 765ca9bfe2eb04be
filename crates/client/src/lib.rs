//! REST fetch capability for adoption-insights.
//!
//! [`InsightsClient`] implements [`adoption_insights_core::InsightFetcher`]
//! against the `/api/insights/{entity}` endpoints.

mod client;
mod credentials;
pub mod error;
mod wire;


pub use client::{truncate, InsightsClient, MAX_ERROR_BODY_LEN};
pub use credentials::credentials_from_env;
pub use error::ClientError;
