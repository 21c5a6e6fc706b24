//! # Engine Configuration
//!
//! Runtime settings for the orchestration core: config cache freshness, per-entity lock
//! wait bounds, prerequisite thresholds and where the workflow document lives.
//!
//! ## Sources
//!
//! Settings are layered by [`ConfigManager`]:
//!
//! 1. Environment defaults (`test` gets short TTLs and lock waits)
//! 2. An optional `orchestrator.yaml` in the configuration directory
//! 3. `ORCHESTRATOR__<SECTION>__<FIELD>` environment overrides
//!
//! ## Usage
//!
//! ```rust,no_run
//! use task_orchestrator::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load_from_directory(None)?;
//! let ttl = manager.config().cache.ttl();
//! let lock_wait = manager.config().locking.timeout();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::defaults;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root settings object
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub locking: LockingConfig,
    pub prerequisites: PrerequisiteConfig,
    pub workflow: WorkflowSourceConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_seconds: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: defaults::CONFIG_CACHE_TTL_SECONDS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockingConfig {
    pub timeout_ms: u64,
}

impl LockingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for LockingConfig {
    fn default() -> Self {
        Self {
            timeout_ms: defaults::LOCK_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrerequisiteConfig {
    pub enabled: bool,
    pub summary_min_length: usize,
    pub summary_max_length: usize,
}

impl Default for PrerequisiteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            summary_min_length: defaults::SUMMARY_MIN_LENGTH,
            summary_max_length: defaults::SUMMARY_MAX_LENGTH,
        }
    }
}

/// Location of the workflow document relative to a working-context root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowSourceConfig {
    pub config_dir: String,
    pub config_file: String,
}

impl WorkflowSourceConfig {
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(&self.config_dir).join(&self.config_file)
    }
}

impl Default for WorkflowSourceConfig {
    fn default() -> Self {
        Self {
            config_dir: defaults::WORKFLOW_CONFIG_DIR.to_string(),
            config_file: defaults::WORKFLOW_CONFIG_FILE.to_string(),
        }
    }
}

impl EngineConfig {
    /// Test-optimized settings: rapid cache invalidation and short lock waits
    pub fn for_test() -> Self {
        Self {
            cache: CacheConfig {
                enabled: true,
                ttl_seconds: 1,
            },
            locking: LockingConfig { timeout_ms: 2_000 },
            ..Self::default()
        }
    }

    /// Base settings for a named environment
    pub fn for_environment(environment: &str) -> Self {
        match environment {
            "test" => Self::for_test(),
            _ => Self::default(),
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.locking.timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "locking.timeout_ms",
                "0",
                "lock timeout must be greater than zero",
            ));
        }

        let prerequisites = &self.prerequisites;
        if prerequisites.summary_min_length > prerequisites.summary_max_length {
            return Err(ConfigurationError::invalid_value(
                "prerequisites.summary_min_length",
                prerequisites.summary_min_length.to_string(),
                format!(
                    "must not exceed summary_max_length ({})",
                    prerequisites.summary_max_length
                ),
            ));
        }

        if self.workflow.config_file.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "config_file",
                "workflow",
            ));
        }

        Ok(())
    }
}
