//! Configuration Loader
//!
//! Environment-aware loading of [`EngineConfig`]. Environment defaults are layered under an
//! optional `orchestrator.yaml` and `ORCHESTRATOR__*` environment variables using the
//! `config` crate, then validated before being handed out.

use super::error::{ConfigResult, ConfigurationError};
use super::EngineConfig;
use crate::constants::defaults;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Loaded, validated engine settings plus where they came from
#[derive(Debug)]
pub struct ConfigManager {
    config: EngineConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection from `./config`
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    /// This is useful for testing without modifying global environment variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "Loading engine configuration"
        );

        let config = Self::build_config(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = %environment,
            cache_ttl_seconds = config.cache.ttl_seconds,
            lock_timeout_ms = config.locking.timeout_ms,
            prerequisites_enabled = config.prerequisites.enabled,
            "Engine configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    fn build_config(config_directory: &Path, environment: &str) -> ConfigResult<EngineConfig> {
        let settings_error = |error: config::ConfigError| ConfigurationError::SettingsError {
            source_dir: config_directory.to_path_buf(),
            error: error.to_string(),
        };

        let base = EngineConfig::for_environment(environment);
        let base_source = config::Config::try_from(&base).map_err(settings_error)?;
        let file_path = config_directory.join(defaults::ENGINE_CONFIG_FILE);

        let settings = config::Config::builder()
            .add_source(base_source)
            .add_source(config::File::from(file_path).required(false))
            .add_source(
                config::Environment::with_prefix(defaults::ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(settings_error)?;

        settings.try_deserialize().map_err(settings_error)
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get the current environment
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Get the configuration directory
    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect current environment from environment variables
    fn detect_environment() -> String {
        env::var("ORCHESTRATOR_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }
}
