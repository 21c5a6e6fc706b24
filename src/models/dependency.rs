//! # Dependency
//!
//! Directed relationships between tasks.
//!
//! ## Overview
//!
//! A `Dependency` connects two tasks with one of three relationship types:
//!
//! - `BLOCKS`: `from` must progress before `to` may start
//! - `IS_BLOCKED_BY`: the inverse view, `from` waits on `to`
//! - `RELATES_TO`: informational, never blocks and never carries an unblock role
//!
//! Blocking edges are normalised to a `(blocker, blocked)` pair by
//! [`Dependency::blocking_pair`], which every graph algorithm in the crate works from,
//! so the two blocking spellings are interchangeable.
//!
//! Dependencies are never mutated in place; a changed relationship is delete + recreate.

use crate::constants::TERMINAL_UNBLOCK_ROLE;
use crate::models::StatusRole;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencyType {
    Blocks,
    IsBlockedBy,
    RelatesTo,
}

impl DependencyType {
    /// Blocking types participate in cycle checks, traversal and unblock semantics
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::Blocks | Self::IsBlockedBy)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocks => "BLOCKS",
            Self::IsBlockedBy => "IS_BLOCKED_BY",
            Self::RelatesTo => "RELATES_TO",
        }
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DependencyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "BLOCKS" => Ok(Self::Blocks),
            "IS_BLOCKED_BY" => Ok(Self::IsBlockedBy),
            "RELATES_TO" => Ok(Self::RelatesTo),
            _ => Err(format!("Invalid dependency type: {s}")),
        }
    }
}

/// A persisted dependency edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub id: Uuid,
    pub from_task_id: Uuid,
    pub to_task_id: Uuid,
    pub dependency_type: DependencyType,
    pub unblock_at: Option<StatusRole>,
    pub created_at: DateTime<Utc>,
}

/// Request to create a dependency, before validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDependency {
    pub from_task_id: Uuid,
    pub to_task_id: Uuid,
    pub dependency_type: DependencyType,
    pub unblock_at: Option<StatusRole>,
}

impl NewDependency {
    pub fn new(from_task_id: Uuid, to_task_id: Uuid, dependency_type: DependencyType) -> Self {
        Self {
            from_task_id,
            to_task_id,
            dependency_type,
            unblock_at: None,
        }
    }

    pub fn blocks(from_task_id: Uuid, to_task_id: Uuid) -> Self {
        Self::new(from_task_id, to_task_id, DependencyType::Blocks)
    }

    pub fn with_unblock_at(mut self, role: StatusRole) -> Self {
        self.unblock_at = Some(role);
        self
    }

    /// Normalised `(blocker, blocked)` pair, `None` for `RELATES_TO`
    pub fn blocking_pair(&self) -> Option<(Uuid, Uuid)> {
        blocking_pair(self.from_task_id, self.to_task_id, self.dependency_type)
    }

    /// Stamp an id and creation time onto the request
    pub fn into_dependency(self) -> Dependency {
        Dependency {
            id: Uuid::new_v4(),
            from_task_id: self.from_task_id,
            to_task_id: self.to_task_id,
            dependency_type: self.dependency_type,
            unblock_at: self.unblock_at,
            created_at: Utc::now(),
        }
    }
}

fn blocking_pair(from: Uuid, to: Uuid, dependency_type: DependencyType) -> Option<(Uuid, Uuid)> {
    match dependency_type {
        DependencyType::Blocks => Some((from, to)),
        DependencyType::IsBlockedBy => Some((to, from)),
        DependencyType::RelatesTo => None,
    }
}

impl Dependency {
    /// Normalised `(blocker, blocked)` pair, `None` for `RELATES_TO`
    pub fn blocking_pair(&self) -> Option<(Uuid, Uuid)> {
        blocking_pair(self.from_task_id, self.to_task_id, self.dependency_type)
    }

    pub fn is_blocking(&self) -> bool {
        self.dependency_type.is_blocking()
    }

    pub fn involves(&self, task_id: Uuid) -> bool {
        self.from_task_id == task_id || self.to_task_id == task_id
    }

    /// True when this edge blocks `task_id`, i.e. `task_id` is the blocked end
    pub fn blocks_task(&self, task_id: Uuid) -> bool {
        matches!(self.blocking_pair(), Some((_, blocked)) if blocked == task_id)
    }

    /// Whether the edge matches an exact `(from, to, type)` relation
    pub fn matches_relation(&self, from: Uuid, to: Uuid, dependency_type: DependencyType) -> bool {
        self.from_task_id == from && self.to_task_id == to && self.dependency_type == dependency_type
    }

    /// `unblockAt` when set, `"terminal"` otherwise; absent for `RELATES_TO`
    pub fn effective_unblock_role(&self) -> Option<String> {
        if !self.is_blocking() {
            return None;
        }
        Some(
            self.unblock_at
                .map(|role| role.to_string())
                .unwrap_or_else(|| TERMINAL_UNBLOCK_ROLE.to_string()),
        )
    }
}

/// Lightweight task details attached to a response when task info is requested
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    pub title: String,
    pub status: String,
}

/// Wire shape of a dependency handed back to the tool layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyView {
    pub id: Uuid,
    pub from_task_id: Uuid,
    pub to_task_id: Uuid,
    #[serde(rename = "type")]
    pub dependency_type: DependencyType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unblock_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_unblock_role: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_task: Option<TaskInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_task: Option<TaskInfo>,
}

impl From<&Dependency> for DependencyView {
    fn from(dependency: &Dependency) -> Self {
        Self {
            id: dependency.id,
            from_task_id: dependency.from_task_id,
            to_task_id: dependency.to_task_id,
            dependency_type: dependency.dependency_type,
            unblock_at: dependency.unblock_at.map(|role| role.to_string()),
            effective_unblock_role: dependency.effective_unblock_role(),
            created_at: dependency.created_at,
            from_task: None,
            to_task: None,
        }
    }
}

impl From<Dependency> for DependencyView {
    fn from(dependency: Dependency) -> Self {
        Self::from(&dependency)
    }
}
