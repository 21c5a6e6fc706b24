//! # Workflow Specification
//!
//! Typed, per-entity-kind description of the status lifecycle, built once when a
//! workflow document is loaded into the config cache and never mutated afterwards.
//!
//! A [`WorkflowSpec`] always satisfies: every status in `default_flow`,
//! `emergency_statuses`, `terminal_statuses` and `status_roles` is in `allowed_statuses`.

use super::source::{KindProgression, ValidationRulesDocument};
use super::states::{built_in_statuses, default_role, FeatureStatus, ProjectStatus, TaskStatus};
use crate::config::{ConfigResult, ConfigurationError};
use crate::models::{EntityKind, Status, StatusRole};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Toggles from the `status_validation` section of the workflow document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRules {
    pub enforce_sequential: bool,
    pub allow_backward: bool,
    pub allow_emergency: bool,
    pub validate_prerequisites: bool,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            enforce_sequential: true,
            allow_backward: true,
            allow_emergency: true,
            validate_prerequisites: true,
        }
    }
}

impl From<&ValidationRulesDocument> for ValidationRules {
    fn from(document: &ValidationRulesDocument) -> Self {
        let defaults = Self::default();
        Self {
            enforce_sequential: document
                .enforce_sequential
                .unwrap_or(defaults.enforce_sequential),
            allow_backward: document.allow_backward.unwrap_or(defaults.allow_backward),
            allow_emergency: document.allow_emergency.unwrap_or(defaults.allow_emergency),
            validate_prerequisites: document
                .validate_prerequisites
                .unwrap_or(defaults.validate_prerequisites),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSpec {
    pub kind: EntityKind,
    pub allowed_statuses: Vec<Status>,
    pub default_flow: Vec<Status>,
    pub emergency_statuses: HashSet<Status>,
    pub terminal_statuses: HashSet<Status>,
    pub status_roles: HashMap<Status, StatusRole>,
    pub rules: ValidationRules,
}

impl WorkflowSpec {
    /// Fallback workflow used when no document is available for `kind`
    pub fn built_in(kind: EntityKind) -> Self {
        let (flow, emergency, terminal) = match kind {
            EntityKind::Task => {
                use TaskStatus::*;
                (
                    statuses(&[Pending, InProgress, Testing, Completed], TaskStatus::to_status),
                    statuses(&[Blocked, OnHold, Cancelled, Deferred], TaskStatus::to_status),
                    statuses(&[Completed, Cancelled, Deferred], TaskStatus::to_status),
                )
            }
            EntityKind::Feature => {
                use FeatureStatus::*;
                (
                    statuses(
                        &[Planning, InDevelopment, Testing, Validating, Completed],
                        FeatureStatus::to_status,
                    ),
                    statuses(&[Blocked, OnHold, Archived], FeatureStatus::to_status),
                    statuses(&[Completed, Archived], FeatureStatus::to_status),
                )
            }
            EntityKind::Project => {
                use ProjectStatus::*;
                (
                    statuses(
                        &[Planning, InDevelopment, Completed, Archived],
                        ProjectStatus::to_status,
                    ),
                    statuses(&[OnHold, Cancelled, Archived], ProjectStatus::to_status),
                    statuses(&[Completed, Cancelled, Archived], ProjectStatus::to_status),
                )
            }
        };

        Self {
            kind,
            allowed_statuses: built_in_statuses(kind)
                .into_iter()
                .map(Status::from_canonical)
                .collect(),
            default_flow: flow,
            emergency_statuses: emergency.into_iter().collect(),
            terminal_statuses: terminal.into_iter().collect(),
            status_roles: HashMap::new(),
            rules: ValidationRules::default(),
        }
    }

    /// Build the spec for `kind` from its `status_progression` entry
    ///
    /// Allowed statuses are the built-in vocabulary followed by any new status the entry
    /// names, in first-seen order.
    pub fn from_progression(
        kind: EntityKind,
        progression: &KindProgression,
        rules: ValidationRules,
    ) -> ConfigResult<Self> {
        let field = |name: &str| format!("status_progression.{}.{name}", kind.config_key());
        let parse_list = |name: &str, raw: &[String]| -> ConfigResult<Vec<Status>> {
            raw.iter()
                .map(|value| {
                    Status::parse(value)
                        .map_err(|err| ConfigurationError::invalid_value(field(name), value, err))
                })
                .collect()
        };

        let default_flow = parse_list("default_flow", &progression.default_flow)?;
        if default_flow.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                field("default_flow"),
                "workflow document",
            ));
        }
        let emergency = parse_list("emergency_transitions", &progression.emergency_transitions)?;
        let terminal = parse_list("terminal_statuses", &progression.terminal_statuses)?;

        let mut status_roles = HashMap::new();
        for (raw_status, raw_role) in &progression.status_roles {
            let status = Status::parse(raw_status).map_err(|err| {
                ConfigurationError::invalid_value(field("status_roles"), raw_status, err)
            })?;
            let role: StatusRole = raw_role.parse().map_err(|err: String| {
                ConfigurationError::invalid_value(field("status_roles"), raw_role, err)
            })?;
            status_roles.insert(status, role);
        }

        let mut allowed_statuses: Vec<Status> = built_in_statuses(kind)
            .into_iter()
            .map(Status::from_canonical)
            .collect();
        let mut seen: HashSet<Status> = allowed_statuses.iter().cloned().collect();
        let named = default_flow
            .iter()
            .chain(&emergency)
            .chain(&terminal)
            .chain(status_roles.keys());
        for status in named {
            if seen.insert(status.clone()) {
                allowed_statuses.push(status.clone());
            }
        }

        Ok(Self {
            kind,
            allowed_statuses,
            default_flow,
            emergency_statuses: emergency.into_iter().collect(),
            terminal_statuses: terminal.into_iter().collect(),
            status_roles,
            rules,
        })
    }

    pub fn is_allowed(&self, status: &Status) -> bool {
        self.allowed_statuses.contains(status)
    }

    pub fn is_terminal(&self, status: &Status) -> bool {
        self.terminal_statuses.contains(status)
    }

    pub fn is_emergency(&self, status: &Status) -> bool {
        self.emergency_statuses.contains(status)
    }

    pub fn flow_position(&self, status: &Status) -> Option<usize> {
        self.default_flow.iter().position(|candidate| candidate == status)
    }

    /// Whether some emergency status leads out of the terminal set
    pub fn has_non_terminal_emergency(&self) -> bool {
        self.emergency_statuses
            .iter()
            .any(|status| !self.terminal_statuses.contains(status))
    }

    /// Lifecycle role of `status`: explicit document role, then terminal membership, then
    /// the built-in name mapping
    pub fn role_of(&self, status: &Status) -> StatusRole {
        if let Some(role) = self.status_roles.get(status) {
            return *role;
        }
        if self.is_terminal(status) {
            return StatusRole::Terminal;
        }
        default_role(status)
    }

    pub fn allowed_names(&self) -> String {
        self.allowed_statuses
            .iter()
            .map(Status::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn statuses<T>(items: &[T], to_status: fn(&T) -> Status) -> Vec<Status> {
    items.iter().map(to_status).collect()
}
