//! Opaque filter criteria forwarded to the backend.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Keys reserved for the page range; callers cannot set them as filters.
pub const RESERVED_FILTER_KEYS: &[&str] = &["start", "end"];

/// String-keyed filter set with optional values.
///
/// Passed verbatim to the fetch capability. Entries whose value is `None`
/// are kept (so a caller can express "cleared") but are not sent on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filters(BTreeMap<String, Option<String>>);

impl Filters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), Some(value.into()));
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: Option<String>) {
        self.0.insert(key.into(), value);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_deref())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// Entries with a value, in key order, as sent on the wire.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .filter(|(k, _)| !RESERVED_FILTER_KEYS.contains(&k.as_str()))
            .filter_map(|(k, v)| v.as_ref().map(|v| (k.clone(), v.clone())))
            .collect()
    }
}

impl FromIterator<(String, Option<String>)> for Filters {
    fn from_iter<I: IntoIterator<Item = (String, Option<String>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Parses a single `key=value` pair, as accepted on the command line.
///
/// `key=` yields a `None` value.
pub fn parse_filter_pair(raw: &str) -> Result<(String, Option<String>), CoreError> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| CoreError::InvalidFilter(format!("expected key=value, got '{raw}'")))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(CoreError::InvalidFilter(format!("empty key in '{raw}'")));
    }
    if RESERVED_FILTER_KEYS.contains(&key) {
        return Err(CoreError::InvalidFilter(format!("'{key}' is reserved for the page range")));
    }
    let value = value.trim();
    Ok((key.to_owned(), (!value.is_empty()).then(|| value.to_owned())))
}

impl FromStr for Filters {
    type Err = CoreError;

    /// Parses a comma-separated list of `key=value` pairs.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(parse_filter_pair)
            .collect()
    }
}
