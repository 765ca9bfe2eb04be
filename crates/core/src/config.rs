//! Batch loading configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_AUTO_REFRESH_MS, DEFAULT_BATCH_DELAY_MS, DEFAULT_BATCH_SIZE, ENV_AUTO_REFRESH_MS,
    ENV_BATCH_DELAY_MS, ENV_BATCH_SIZE,
};
use crate::env_config::env_parse_with_default;
use crate::error::CoreError;

/// Paging and timer settings of one loader instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawBatchLoadConfig")]
pub struct BatchLoadConfig {
    batch_size: usize,
    #[serde(serialize_with = "millis::serialize")]
    delay: Duration,
    #[serde(serialize_with = "millis::serialize")]
    auto_refresh_interval: Duration,
}

/// Unvalidated wire form; deserialization goes through [`BatchLoadConfig::new`].
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBatchLoadConfig {
    batch_size: usize,
    #[serde(with = "millis")]
    delay: Duration,
    #[serde(with = "millis")]
    auto_refresh_interval: Duration,
}

impl TryFrom<RawBatchLoadConfig> for BatchLoadConfig {
    type Error = CoreError;

    fn try_from(raw: RawBatchLoadConfig) -> Result<Self, Self::Error> {
        Self::new(raw.batch_size, raw.delay, raw.auto_refresh_interval)
    }
}

impl Default for BatchLoadConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            delay: Duration::from_millis(DEFAULT_BATCH_DELAY_MS),
            auto_refresh_interval: Duration::from_millis(DEFAULT_AUTO_REFRESH_MS),
        }
    }
}

impl BatchLoadConfig {
    /// # Errors
    /// Returns [`CoreError::InvalidConfig`] when `batch_size` is zero.
    pub fn new(
        batch_size: usize,
        delay: Duration,
        auto_refresh_interval: Duration,
    ) -> Result<Self, CoreError> {
        if batch_size == 0 {
            return Err(CoreError::InvalidConfig("batch_size must be greater than zero".to_owned()));
        }
        Ok(Self { batch_size, delay, auto_refresh_interval })
    }

    /// Reads `INSIGHTS_BATCH_SIZE`, `INSIGHTS_BATCH_DELAY_MS` and
    /// `INSIGHTS_AUTO_REFRESH_MS`, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let mut batch_size = env_parse_with_default(ENV_BATCH_SIZE, DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            tracing::warn!(
                var = ENV_BATCH_SIZE,
                default = DEFAULT_BATCH_SIZE,
                "batch size must be positive, using default"
            );
            batch_size = DEFAULT_BATCH_SIZE;
        }
        let delay_ms = env_parse_with_default(ENV_BATCH_DELAY_MS, DEFAULT_BATCH_DELAY_MS);
        let refresh_ms = env_parse_with_default(ENV_AUTO_REFRESH_MS, DEFAULT_AUTO_REFRESH_MS);
        Self {
            batch_size,
            delay: Duration::from_millis(delay_ms),
            auto_refresh_interval: Duration::from_millis(refresh_ms),
        }
    }

    /// # Errors
    /// Returns [`CoreError::InvalidConfig`] when `batch_size` is zero.
    pub fn with_batch_size(self, batch_size: usize) -> Result<Self, CoreError> {
        Self::new(batch_size, self.delay, self.auto_refresh_interval)
    }

    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub const fn with_auto_refresh_interval(mut self, interval: Duration) -> Self {
        self.auto_refresh_interval = interval;
        self
    }

    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    #[must_use]
    pub const fn auto_refresh_interval(&self) -> Duration {
        self.auto_refresh_interval
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::cast_possible_truncation, reason = "durations here fit in u64 millis")]
    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
