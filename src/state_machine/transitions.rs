//! Status and transition validation against the cached workflow.

use super::config_cache::ConfigCache;
use super::source::ConfigContext;
use super::workflow::WorkflowSpec;
use crate::models::{EntityKind, Status};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Outcome of a status or transition check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "reason", rename_all = "lowercase")]
pub enum ValidationResult {
    Valid,
    Invalid(String),
}

impl ValidationResult {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid(reason.into())
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Valid => None,
            Self::Invalid(reason) => Some(reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransitionValidator {
    cache: Arc<ConfigCache>,
}

impl TransitionValidator {
    pub fn new(cache: Arc<ConfigCache>) -> Self {
        Self { cache }
    }

    /// Whether `raw` names a status allowed for `kind`
    pub async fn validate_status(
        &self,
        kind: EntityKind,
        raw: &str,
        context: &ConfigContext,
    ) -> ValidationResult {
        let status = match Status::parse(raw) {
            Ok(status) => status,
            Err(reason) => return ValidationResult::Invalid(reason),
        };
        let spec = self.cache.get(kind, context).await;
        check_status(&spec, &status)
    }

    pub async fn validate(
        &self,
        kind: EntityKind,
        from: &Status,
        to: &Status,
        context: &ConfigContext,
    ) -> ValidationResult {
        let spec = self.cache.get(kind, context).await;
        check_transition(&spec, from, to)
    }
}

pub fn check_status(spec: &WorkflowSpec, status: &Status) -> ValidationResult {
    if spec.is_allowed(status) {
        ValidationResult::Valid
    } else {
        ValidationResult::invalid(format!(
            "Invalid status '{status}' for {}. Allowed statuses: {}",
            spec.kind,
            spec.allowed_names()
        ))
    }
}

/// Apply the workflow's transition rules to `from -> to`
///
/// Rules, first match wins:
///
/// 1. both ends must be allowed, and must differ
/// 2. with `enforce_sequential` off, anything allowed goes
/// 3. the next status in the default flow
/// 4. any earlier status in the default flow, when `allow_backward`
/// 5. any emergency status, when `allow_emergency`
/// 6. out of a terminal status, only back into the flow via an emergency status
/// 7. from a status outside the flow (e.g. `BLOCKED`) back into a non-terminal flow status
pub fn check_transition(spec: &WorkflowSpec, from: &Status, to: &Status) -> ValidationResult {
    for status in [from, to] {
        if let invalid @ ValidationResult::Invalid(_) = check_status(spec, status) {
            return invalid;
        }
    }
    if from == to {
        return ValidationResult::invalid(format!("{} is already in status {to}", spec.kind));
    }

    let rules = spec.rules;
    if !rules.enforce_sequential {
        return ValidationResult::Valid;
    }

    let from_position = spec.flow_position(from);
    let to_position = spec.flow_position(to);

    if let (Some(current), Some(target)) = (from_position, to_position) {
        if target == current + 1 {
            return ValidationResult::Valid;
        }
        if target < current && rules.allow_backward {
            return ValidationResult::Valid;
        }
    }

    if rules.allow_emergency && spec.is_emergency(to) {
        return ValidationResult::Valid;
    }

    if spec.is_terminal(from) {
        if rules.allow_emergency && to_position.is_some() && spec.has_non_terminal_emergency() {
            return ValidationResult::Valid;
        }
        return ValidationResult::invalid(format!(
            "Cannot transition from terminal status {from} to {to}: only emergency transitions are allowed"
        ));
    }

    if from_position.is_none() && to_position.is_some() {
        if spec.is_terminal(to) {
            return ValidationResult::invalid(format!(
                "Cannot resume from {from} directly into terminal status {to}"
            ));
        }
        return ValidationResult::Valid;
    }

    let reason = match (from_position, to_position) {
        (Some(current), Some(target)) if target > current => format!(
            "Cannot skip from {from} to {to}: the next status in default flow is {}",
            spec.default_flow[current + 1]
        ),
        (Some(_), Some(_)) => format!("Backward transition from {from} to {to} is not allowed"),
        _ => format!("{to} is not the next status in default flow and not an emergency status"),
    };
    ValidationResult::Invalid(reason)
}
