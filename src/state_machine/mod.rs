//! # Status Progression
//!
//! Governs when a task, feature or project may change status.
//!
//! - [`WorkflowSpec`]: typed per-kind workflow (allowed statuses, default flow, emergency
//!   and terminal sets, status roles, rule toggles)
//! - [`WorkflowConfigSource`] / [`YamlFileConfigSource`]: where workflow documents come from
//! - [`ConfigCache`]: TTL + fingerprint cache of specs with built-in fallback
//! - [`TransitionValidator`]: sequential/backward/emergency/terminal rules
//! - [`PrerequisiteChecker`]: entity-specific guards (summary bounds, child completion,
//!   blocking dependencies)

pub mod config_cache;
pub mod errors;
pub mod guards;
pub mod source;
pub mod states;
pub mod transitions;
pub mod workflow;

pub use config_cache::{CacheStats, ConfigCache, ConfigCacheEntry};
pub use errors::{BlockingItem, PrerequisiteFailure, PrerequisiteRule};
pub use guards::{PrerequisiteChecker, PrerequisiteOutcome, StateGuard};
pub use source::{ConfigContext, WorkflowConfigSource, WorkflowDocument, YamlFileConfigSource};
pub use states::{FeatureStatus, ProjectStatus, TaskStatus};
pub use transitions::{TransitionValidator, ValidationResult};
pub use workflow::{ValidationRules, WorkflowSpec};
