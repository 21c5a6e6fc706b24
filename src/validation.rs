//! Input validation for the orchestration core
//!
//! Normalises and checks the loosely-typed values the tool layer hands over (status names,
//! dependency types, unblock roles) before they reach the typed core.

use crate::error::{OrchestratorError, Result};
use crate::models::{DependencyType, EntityKind, NewDependency, StatusRole};

/// Maximum length of a status name
const MAX_STATUS_LENGTH: usize = 64;

/// Canonicalise a status name: trim, upper-case, `-` and spaces become `_`
///
/// Returns the reason as a plain string so it can back `FromStr` impls.
pub fn normalize_status(raw: &str) -> std::result::Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("Status must not be empty".to_string());
    }
    if trimmed.len() > MAX_STATUS_LENGTH {
        return Err(format!(
            "Status too long: {} chars (max: {MAX_STATUS_LENGTH})",
            trimmed.len()
        ));
    }

    let normalized: String = trimmed
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect();

    if !normalized
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(format!("Invalid status name: {raw}"));
    }

    Ok(normalized)
}

pub fn parse_entity_kind(raw: &str) -> Result<EntityKind> {
    raw.parse().map_err(OrchestratorError::Validation)
}

pub fn parse_dependency_type(raw: &str) -> Result<DependencyType> {
    raw.parse().map_err(OrchestratorError::Validation)
}

/// Parse an optional `unblockAt` value for a dependency of the given type
///
/// Only `work`, `review` and `terminal` are accepted, and only on blocking types.
pub fn parse_unblock_role(
    raw: Option<&str>,
    dependency_type: DependencyType,
) -> Result<Option<StatusRole>> {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };

    if !dependency_type.is_blocking() {
        return Err(OrchestratorError::validation(format!(
            "unblockAt is only valid for BLOCKS or IS_BLOCKED_BY dependencies, not {dependency_type}"
        )));
    }

    let role: StatusRole = raw.parse().map_err(OrchestratorError::Validation)?;
    if !role.is_valid_unblock_role() {
        return Err(OrchestratorError::validation(format!(
            "Invalid unblockAt '{raw}': must be one of work, review, terminal"
        )));
    }

    Ok(Some(role))
}

/// Structural checks on a dependency request that need no repository access
pub fn validate_new_dependency(request: &NewDependency) -> Result<()> {
    if request.from_task_id == request.to_task_id {
        return Err(OrchestratorError::SelfDependency {
            task_id: request.from_task_id,
        });
    }

    if let Some(role) = request.unblock_at {
        if !request.dependency_type.is_blocking() {
            return Err(OrchestratorError::validation(
                "unblockAt is only valid for BLOCKS or IS_BLOCKED_BY dependencies",
            ));
        }
        if !role.is_valid_unblock_role() {
            return Err(OrchestratorError::validation(format!(
                "Invalid unblockAt '{role}': must be one of work, review, terminal"
            )));
        }
    }

    Ok(())
}
