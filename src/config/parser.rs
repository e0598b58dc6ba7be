//! Configuration parser for loading the tool configuration.
//!
//! This module handles loading configuration from YAML files and environment
//! variables, with proper precedence and error handling.

use crate::error::{CloudPilotError, ConfigError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::AppConfig;

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["cloudpilot.yaml", "cloudpilot.yml"];

/// Configuration parser.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving the `.env` file.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<AppConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(CloudPilotError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            CloudPilotError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<AppConfig> {
        debug!("Parsing YAML configuration");

        // An empty file is a valid, all-defaults configuration.
        if content.trim().is_empty() {
            return Ok(AppConfig::default());
        }

        serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            CloudPilotError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })
    }

    /// Loads the explicit file, or the nearest discovered one, or defaults.
    /// Environment overrides are applied in every case.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit path is missing or any file is invalid.
    pub fn load_or_default(&self, explicit: Option<&Path>) -> Result<AppConfig> {
        let mut config = match explicit {
            Some(path) => self.load_file(path)?,
            None => {
                let start = self
                    .base_path
                    .clone()
                    .map_or_else(std::env::current_dir, Ok)?;
                match find_config_file(&start) {
                    Some(path) => self.load_file(path)?,
                    None => {
                        debug!("No configuration file found, using defaults");
                        AppConfig::default()
                    }
                }
            }
        };

        Self::apply_env_overrides(&mut config);
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(config: &mut AppConfig) {
        if let Ok(endpoint) = std::env::var("CLOUDPILOT_ENDPOINT") {
            debug!("Overriding provider.endpoint from environment");
            config.provider.endpoint = Some(endpoint);
        }

        if let Some(secs) = std::env::var("CLOUDPILOT_STEP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            debug!("Overriding execution.step_timeout_secs from environment");
            config.execution.step_timeout_secs = secs;
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                CloudPilotError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Reads the provider API key from the configured variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is not set.
    pub fn get_api_key(config: &AppConfig) -> Result<String> {
        let name = &config.provider.api_key_env;
        std::env::var(name).map_err(|_| {
            CloudPilotError::Config(ConfigError::MissingEnvVar { name: name.clone() })
        })
    }
}

/// Finds a configuration file in `start_dir` or its parents.
#[must_use]
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Option<PathBuf> {
    let mut current = start_dir.as_ref().to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Some(config_path);
            }
        }

        if !current.pop() {
            return None;
        }
    }
}
