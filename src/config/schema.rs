use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::batch::FailurePolicy;
use crate::discrepancy::ValidatorOptions;
use crate::scoring::ScoringConfig;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT: &str = "60s";
pub const DEFAULT_HISTORY_LIMIT: u32 = 10;
pub const DEFAULT_RETRIES: usize = 3;
pub const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<BatchConfig>,

    #[serde(default)]
    pub validator: ValidatorOptions,

    /// tracing filter used when RUST_LOG is unset, e.g. "info" or "pmo_agent=debug"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Config {
    pub fn effective_log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// Failure policy from the config file, if one was chosen there.
    pub fn on_invalid(&self) -> Option<FailurePolicy> {
        self.batch.as_ref().map(|b| b.on_invalid)
    }
}

/// Remote analysis service.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Per-request timeout as a duration string ("30s", "2m")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Records fetched per history listing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_limit: Option<u32>,

    /// Attempts for idempotent requests. Uploads are never retried.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<usize>,
}

impl ServiceConfig {
    pub fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn effective_timeout(&self) -> Result<Duration, humantime::DurationError> {
        humantime::parse_duration(self.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT).trim())
    }

    pub fn effective_history_limit(&self) -> u32 {
        self.history_limit.unwrap_or(DEFAULT_HISTORY_LIMIT)
    }

    pub fn effective_retries(&self) -> usize {
        self.retries.unwrap_or(DEFAULT_RETRIES)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    pub on_invalid: FailurePolicy,
}
