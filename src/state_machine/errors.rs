use crate::models::{EntityKind, StatusRole};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Which prerequisite rule rejected a transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum PrerequisiteRule {
    SummaryLength {
        actual: usize,
        min: usize,
        max: usize,
    },
    BlockingDependencies,
    NoChildTasks,
    IncompleteChildTasks,
    IncompleteChildFeatures,
}

/// An entity standing in the way of a transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockingItem {
    pub id: Uuid,
    pub kind: EntityKind,
    pub title: String,
    pub status: String,
    /// Role the item must reach before it stops blocking; set for dependency blockers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_role: Option<StatusRole>,
}

impl fmt::Display for BlockingItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' ({}, {})", self.kind, self.title, self.id, self.status)?;
        if let Some(role) = self.required_role {
            write!(f, " must reach {role}")?;
        }
        Ok(())
    }
}

/// Unmet business rule, with enough detail for the caller to resolve it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("{reason}{}", list_items(.blocking_items))]
pub struct PrerequisiteFailure {
    #[serde(flatten)]
    pub rule: PrerequisiteRule,
    pub reason: String,
    pub blocking_items: Vec<BlockingItem>,
}

impl PrerequisiteFailure {
    pub fn new(rule: PrerequisiteRule, reason: impl Into<String>) -> Self {
        Self {
            rule,
            reason: reason.into(),
            blocking_items: Vec::new(),
        }
    }

    pub fn with_items(mut self, items: Vec<BlockingItem>) -> Self {
        self.blocking_items = items;
        self
    }
}

fn list_items(items: &[BlockingItem]) -> String {
    if items.is_empty() {
        return String::new();
    }
    let items: Vec<String> = items.iter().map(ToString::to_string).collect();
    format!(" [{}]", items.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_display_lists_items() {
        let id = Uuid::nil();
        let failure = PrerequisiteFailure::new(
            PrerequisiteRule::BlockingDependencies,
            "Task is blocked by 1 incomplete task",
        )
        .with_items(vec![BlockingItem {
            id,
            kind: EntityKind::Task,
            title: "schema".into(),
            status: "IN_PROGRESS".into(),
            required_role: Some(StatusRole::Terminal),
        }]);

        assert_eq!(
            failure.to_string(),
            format!("Task is blocked by 1 incomplete task [task 'schema' ({id}, IN_PROGRESS) must reach terminal]")
        );
    }

    #[test]
    fn test_failure_without_items_is_a_plain_error() {
        let failure = PrerequisiteFailure::new(PrerequisiteRule::NoChildTasks, "Feature has no tasks");
        assert_eq!(failure.to_string(), "Feature has no tasks");

        let err: &dyn std::error::Error = &failure;
        assert!(err.source().is_none());
    }

    #[test]
    fn test_failure_serializes_rule_inline() {
        let failure = PrerequisiteFailure::new(
            PrerequisiteRule::SummaryLength {
                actual: 45,
                min: 300,
                max: 500,
            },
            "too short",
        );
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["rule"], "summary_length");
        assert_eq!(json["actual"], 45);
        assert_eq!(json["blockingItems"].as_array().unwrap().len(), 0);
    }
}
