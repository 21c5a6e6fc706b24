//! Error types for the orchestration core.
//!
//! Every fallible operation in the crate returns [`Result<T>`]. Variants are grouped into
//! an [`ErrorCategory`] so the tool layer can map them onto its own response codes without
//! matching on individual variants.

use crate::config::ConfigurationError;
use crate::models::DependencyType;
use crate::state_machine::PrerequisiteFailure;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// The kind of record a [`OrchestratorError::NotFound`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingRecord {
    Task,
    Feature,
    Project,
    Dependency,
}

impl std::fmt::Display for MissingRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Task => write!(f, "task"),
            Self::Feature => write!(f, "feature"),
            Self::Project => write!(f, "project"),
            Self::Dependency => write!(f, "dependency"),
        }
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Validation error: a task cannot depend on itself ({task_id})")]
    SelfDependency { task_id: Uuid },

    #[error("{record} not found: {id}")]
    NotFound { record: MissingRecord, id: Uuid },

    #[error("Dependency {dependency_type} from {from_task_id} to {to_task_id} already exists")]
    DuplicateDependency {
        from_task_id: Uuid,
        to_task_id: Uuid,
        dependency_type: DependencyType,
    },

    #[error("Adding {dependency_type} from {from_task_id} to {to_task_id} would create a cycle")]
    CycleDetected {
        from_task_id: Uuid,
        to_task_id: Uuid,
        dependency_type: DependencyType,
    },

    #[error("Timed out after {waited:?} waiting for the lock on entity {entity_id}")]
    LockTimeout { entity_id: Uuid, waited: Duration },

    #[error("Prerequisites not met: {0}")]
    PrerequisiteUnmet(PrerequisiteFailure),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Repository error: {0}")]
    Repository(String),
}

/// Coarse classification used at the tool boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Conflict,
    PrerequisiteUnmet,
    Configuration,
    Internal,
}

impl OrchestratorError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) | Self::SelfDependency { .. } => ErrorCategory::Validation,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::DuplicateDependency { .. }
            | Self::CycleDetected { .. }
            | Self::LockTimeout { .. } => ErrorCategory::Conflict,
            Self::PrerequisiteUnmet(_) => ErrorCategory::PrerequisiteUnmet,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Repository(_) => ErrorCategory::Internal,
        }
    }

    /// Whether a caller may reasonably retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout { .. } | Self::Repository(_))
    }

    pub fn not_found(record: MissingRecord, id: Uuid) -> Self {
        Self::NotFound { record, id }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
