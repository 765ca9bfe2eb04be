//! Typed error enum for the service layer.
//!
//! Fetch failures never surface here: they are published through
//! `ServiceState::error`. Only construction-time misconfiguration is
//! returned to callers.

use adoption_insights_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Unknown entity type, zero batch size, bad filter.
    #[error("misconfiguration: {0}")]
    Config(#[from] CoreError),
}

impl ServiceError {
    /// Whether this error names an entity type the loader does not know.
    pub fn is_unknown_entity(&self) -> bool {
        matches!(self, Self::Config(CoreError::UnknownEntityType(_)))
    }
}
