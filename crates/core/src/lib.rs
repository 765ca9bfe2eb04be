//! Core types and traits for adoption-insights
//!
//! This crate contains domain types shared across all other crates: entity
//! types, filters, the page model, the published loader state, and the
//! fetch/credential seams implemented by the REST client.

pub mod constants;
mod config;
mod entity;
mod env_config;
mod error;
mod fetcher;
mod filters;
mod insight;
mod page;
mod state;

pub use config::BatchLoadConfig;
pub use entity::EntityType;
pub use env_config::{env_parse_with_default, env_string};
pub use error::*;
pub use fetcher::{CredentialStore, InsightFetcher, MemoryCredentialStore};
pub use filters::{parse_filter_pair, Filters, RESERVED_FILTER_KEYS};
pub use insight::{total_cost, Insight, OrganizationInsight, ProjectInsight, UserInsight};
pub use page::{Page, PageRange};
pub use state::ServiceState;
