//! Snapshot published by the incremental loader.

use serde::{Deserialize, Serialize};

/// Accumulated records plus loading metadata for one loading cycle.
///
/// Subscribers always receive an owned clone, never a reference into the
/// loader's own copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceState<T> {
    /// Records in arrival order across pages.
    pub data: Vec<T>,
    /// True while the first page of a cycle is awaited.
    pub loading: bool,
    /// Last fetch error message; cleared when a new cycle starts.
    pub error: Option<String>,
    /// False once a fetch returned an empty page.
    pub has_more: bool,
    /// Pages absorbed so far in this cycle.
    pub current_page: usize,
    /// Backend total on the first page, accumulated length afterwards.
    pub total_count: usize,
}

impl<T> Default for ServiceState<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            loading: false,
            error: None,
            has_more: true,
            current_page: 0,
            total_count: 0,
        }
    }
}

impl<T> ServiceState<T> {
    /// State published at the start of a new cycle.
    #[must_use]
    pub fn loading() -> Self {
        Self { loading: true, ..Self::default() }
    }

    /// Fraction of `total_count` loaded, clamped to `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss, reason = "row counts stay far below 2^52")]
    pub fn progress(&self) -> Option<f64> {
        if self.total_count == 0 {
            return None;
        }
        Some((self.data.len() as f64 / self.total_count as f64).clamp(0.0, 1.0))
    }

    /// Records were loaded but a later page failed.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.data.is_empty() && self.error.is_some()
    }

    /// The cycle finished: exhausted, or ended by an error.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !self.loading && (!self.has_more || self.error.is_some())
    }
}
