//! Configuration types for the cloudpilot tool.
//!
//! This module defines the structs that map to the `cloudpilot.yaml` file.
//! Every section is optional; a missing file yields the defaults.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default provider request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default maximum retries for transient provider failures.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay between retries in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Default bound on a single step's provider call, in seconds.
pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 300;

/// Default environment variable holding the provider API key.
pub const DEFAULT_API_KEY_ENV: &str = "CLOUDPILOT_API_KEY";

/// Default directory for deployment history.
pub const DEFAULT_HISTORY_DIR: &str = ".cloudpilot/history";

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Provider gateway settings.
    pub provider: ProviderConfig,
    /// Execution settings.
    pub execution: ExecutionConfig,
    /// Price overrides.
    pub pricing: PricingConfig,
    /// Deployment history settings.
    pub history: HistoryConfig,
}

/// Provider gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of the provider gateway.
    pub endpoint: Option<String>,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Maximum attempts for retryable failures.
    pub max_retries: u32,
    /// Base delay between attempts in milliseconds.
    pub retry_delay_ms: u64,
}

/// Execution settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Bound on each provider call made by the executor, in seconds.
    pub step_timeout_secs: u64,
}

/// Price overrides applied on top of the built-in rate card.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PricingConfig {
    /// Hourly rate per instance class.
    pub compute: BTreeMap<String, Decimal>,
    /// Rates per storage service.
    pub storage: BTreeMap<String, StorageRateConfig>,
}

/// Rates of one storage service. Missing values keep the built-in rate.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageRateConfig {
    /// Price per GB-month stored.
    pub storage_per_gb_month: Option<Decimal>,
    /// Price per GB transferred out.
    pub transfer_per_gb: Option<Decimal>,
}

/// Deployment history settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HistoryConfig {
    /// Whether apply runs are recorded.
    pub enabled: bool,
    /// Directory holding history records.
    pub dir: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key_env: String::from(DEFAULT_API_KEY_ENV),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            step_timeout_secs: DEFAULT_STEP_TIMEOUT_SECS,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: String::from(DEFAULT_HISTORY_DIR),
        }
    }
}
