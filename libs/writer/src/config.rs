use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::resolver::DEFAULT_SHADOW_SUFFIX;
use crate::retry::{RetryConfig, RetryPolicy};

/// Settings of one writer instance. Validated once, before any record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WriterConfig {
    /// Target table.
    pub table: String,
    /// Registered record type every message is decoded as.
    pub record_type: String,
    /// Build plans but never call the store.
    #[serde(default)]
    pub dry_run: bool,
    /// Maximum conditional updates in flight.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Per-call timeout; a timed-out call is a transient error.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    /// Invocation deadline. Unfinished plans are abandoned when it passes.
    #[serde(default)]
    pub deadline_ms: Option<u64>,
    #[serde(default = "default_shadow_suffix")]
    pub shadow_suffix: String,
}

fn default_concurrency() -> usize {
    25
}
fn default_call_timeout_ms() -> u64 {
    3000
}
fn default_shadow_suffix() -> String {
    DEFAULT_SHADOW_SUFFIX.into()
}

impl WriterConfig {
    /// Defaults for everything but the two required settings.
    pub fn new(table: impl Into<String>, record_type: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            record_type: record_type.into(),
            dry_run: false,
            concurrency: default_concurrency(),
            retry: RetryConfig::default(),
            call_timeout_ms: default_call_timeout_ms(),
            deadline_ms: None,
            shadow_suffix: default_shadow_suffix(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.table.trim().is_empty() {
            return Err(ConfigError::invalid("table", "must not be empty"));
        }
        if self.record_type.trim().is_empty() {
            return Err(ConfigError::invalid("record_type", "must not be empty"));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::invalid("concurrency", "must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::invalid("retry.max_attempts", "must be at least 1"));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::invalid(
                "retry.base_delay_ms",
                format!("{} exceeds retry.max_delay_ms {}", self.retry.base_delay_ms, self.retry.max_delay_ms),
            ));
        }
        if self.call_timeout_ms == 0 {
            return Err(ConfigError::invalid("call_timeout_ms", "must be positive"));
        }
        match self.deadline_ms {
            Some(deadline) if self.call_timeout_ms >= deadline => {
                return Err(ConfigError::invalid(
                    "call_timeout_ms",
                    format!("{} must be shorter than deadline_ms {deadline}", self.call_timeout_ms),
                ));
            }
            _ => {}
        }
        if self.shadow_suffix.is_empty() {
            return Err(ConfigError::invalid("shadow_suffix", "must not be empty"));
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.retry)
    }
}
