//! Configuration module for cloudpilot.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `cloudpilot.yaml`
//! - Environment variable overrides and `.env` loading
//! - Validation of configuration values

mod parser;
mod spec;
mod validator;

pub use parser::{find_config_file, ConfigParser, DEFAULT_CONFIG_FILES};
pub use spec::{
    AppConfig, ExecutionConfig, HistoryConfig, PricingConfig, ProviderConfig, StorageRateConfig,
    DEFAULT_API_KEY_ENV, DEFAULT_HISTORY_DIR, DEFAULT_MAX_RETRIES, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_RETRY_DELAY_MS, DEFAULT_STEP_TIMEOUT_SECS,
};
pub use validator::ConfigValidator;
