//! # System Constants
//!
//! Defaults and well-known names that define the operational boundaries of the
//! orchestration core. Runtime-tunable values live in [`crate::config::EngineConfig`];
//! the constants here are the values it falls back to.

/// Structured event names emitted through `tracing`
pub mod events {
    pub const DEPENDENCY_CREATED: &str = "dependency.created";
    pub const DEPENDENCY_REJECTED: &str = "dependency.rejected";
    pub const DEPENDENCY_DELETED: &str = "dependency.deleted";
    pub const DEPENDENCIES_BULK_DELETED: &str = "dependency.bulk_deleted";

    pub const STATUS_CHANGED: &str = "status.changed";
    pub const STATUS_TRANSITION_REJECTED: &str = "status.transition_rejected";
    pub const STATUS_PREREQUISITES_UNMET: &str = "status.prerequisites_unmet";

    pub const WORKFLOW_CONFIG_RELOADED: &str = "workflow_config.reloaded";
    pub const WORKFLOW_CONFIG_FALLBACK: &str = "workflow_config.fallback";
}

/// Built-in defaults
pub mod defaults {
    /// Time a cached workflow spec stays fresh
    pub const CONFIG_CACHE_TTL_SECONDS: u64 = 60;

    /// Bounded wait for a per-entity lock before `LockTimeout`
    pub const LOCK_TIMEOUT_MS: u64 = 30_000;

    /// Inclusive bounds on a task summary when completing a task
    pub const SUMMARY_MIN_LENGTH: usize = 300;
    pub const SUMMARY_MAX_LENGTH: usize = 500;

    /// Location of the workflow document relative to the working-context root
    pub const WORKFLOW_CONFIG_DIR: &str = ".taskorchestrator";
    pub const WORKFLOW_CONFIG_FILE: &str = "config.yaml";

    /// Engine settings file looked up by `ConfigManager`
    pub const ENGINE_CONFIG_FILE: &str = "orchestrator.yaml";

    /// Prefix for engine settings overrides, e.g. `ORCHESTRATOR__CACHE__TTL_SECONDS=5`
    pub const ENV_PREFIX: &str = "ORCHESTRATOR";

    /// Cap on the workflow document size accepted from disk
    pub const MAX_WORKFLOW_CONFIG_BYTES: u64 = 1024 * 1024;
}

/// Role value reported for blocking edges that carry no explicit unblock role
pub const TERMINAL_UNBLOCK_ROLE: &str = "terminal";
