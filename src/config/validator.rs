//! Configuration validation.

use crate::error::{ConfigError, Result};
use tracing::debug;

use super::spec::AppConfig;

/// Validator for the tool configuration.
#[derive(Debug, Default)]
pub struct ConfigValidator {
    /// Whether a provider endpoint is mandatory (apply needs one).
    require_endpoint: bool,
}

impl ConfigValidator {
    /// Creates a validator that does not require an endpoint.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            require_endpoint: false,
        }
    }

    /// Requires `provider.endpoint` to be set.
    #[must_use]
    pub const fn requiring_endpoint(mut self) -> Self {
        self.require_endpoint = true;
        self
    }

    /// Validates a configuration.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self, config: &AppConfig) -> Result<()> {
        match config.provider.endpoint.as_deref() {
            Some(endpoint) if !is_http_url(endpoint) => {
                return Err(ConfigError::validation(
                    format!("Endpoint '{endpoint}' must start with http:// or https://"),
                    "provider.endpoint",
                )
                .into());
            }
            None if self.require_endpoint => {
                return Err(ConfigError::validation(
                    "A provider endpoint is required (set provider.endpoint or CLOUDPILOT_ENDPOINT)",
                    "provider.endpoint",
                )
                .into());
            }
            _ => {}
        }

        if config.provider.api_key_env.trim().is_empty() {
            return Err(ConfigError::validation(
                "API key variable name cannot be empty",
                "provider.api_key_env",
            )
            .into());
        }

        if config.provider.request_timeout_secs == 0 {
            return Err(ConfigError::validation(
                "Request timeout must be positive",
                "provider.request_timeout_secs",
            )
            .into());
        }

        if config.execution.step_timeout_secs == 0 {
            return Err(ConfigError::validation(
                "Step timeout must be positive",
                "execution.step_timeout_secs",
            )
            .into());
        }

        for (class, rate) in &config.pricing.compute {
            if rate.is_sign_negative() {
                return Err(ConfigError::validation(
                    format!("Hourly rate for '{class}' cannot be negative"),
                    format!("pricing.compute.{class}"),
                )
                .into());
            }
        }

        for (service, rates) in &config.pricing.storage {
            let negative = [rates.storage_per_gb_month, rates.transfer_per_gb]
                .into_iter()
                .flatten()
                .any(|r| r.is_sign_negative());
            if negative {
                return Err(ConfigError::validation(
                    format!("Storage rates for '{service}' cannot be negative"),
                    format!("pricing.storage.{service}"),
                )
                .into());
            }
        }

        if config.history.enabled && config.history.dir.trim().is_empty() {
            return Err(ConfigError::validation(
                "History directory cannot be empty",
                "history.dir",
            )
            .into());
        }

        debug!("Configuration validation passed");
        Ok(())
    }
}

fn is_http_url(endpoint: &str) -> bool {
    endpoint.starts_with("http://") || endpoint.starts_with("https://")
}
