//! Work items whose status the core governs: tasks, features and projects.
//!
//! Records here are the slice of the external entity store the core reads. Content sections,
//! tags and the rest of an entity live behind the repository and are not modelled.

use crate::validation::normalize_status;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Task,
    Feature,
    Project,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [Self::Task, Self::Feature, Self::Project];

    /// Key used for this kind under `status_progression` in the workflow document
    pub fn config_key(&self) -> &'static str {
        match self {
            Self::Task => "tasks",
            Self::Feature => "features",
            Self::Project => "projects",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task => write!(f, "task"),
            Self::Feature => write!(f, "feature"),
            Self::Project => write!(f, "project"),
        }
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "task" | "tasks" => Ok(Self::Task),
            "feature" | "features" => Ok(Self::Feature),
            "project" | "projects" => Ok(Self::Project),
            _ => Err(format!("Invalid entity kind: {s}")),
        }
    }
}

/// A workflow status in canonical form (`IN_PROGRESS`)
///
/// Statuses are strings rather than an enum because a workflow document may introduce
/// statuses of its own. `in-progress`, `in_progress` and `IN_PROGRESS` parse to the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Status(String);

impl Status {
    pub fn parse(raw: &str) -> Result<Self, String> {
        normalize_status(raw).map(Self)
    }

    /// Wrap a name already known to be canonical (built-in status tables)
    pub(crate) fn from_canonical(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is(&self, canonical: &str) -> bool {
        self.0 == canonical
    }

    /// Lower-case, hyphenated spelling used in workflow documents
    pub fn config_name(&self) -> String {
        self.0.to_ascii_lowercase().replace('_', "-")
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Status {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Status> for String {
    fn from(status: Status) -> Self {
        status.0
    }
}

/// Lifecycle stage a status belongs to
///
/// `Queue < Work < Review < Terminal` are ordered; `Blocked` sits outside the order and
/// never satisfies an unblock requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusRole {
    Queue,
    Work,
    Review,
    Blocked,
    Terminal,
}

impl StatusRole {
    fn rank(&self) -> Option<u8> {
        match self {
            Self::Queue => Some(0),
            Self::Work => Some(1),
            Self::Review => Some(2),
            Self::Terminal => Some(3),
            Self::Blocked => None,
        }
    }

    /// Whether an entity in this role has reached (or passed) `required`
    pub fn satisfies(&self, required: StatusRole) -> bool {
        match (self.rank(), required.rank()) {
            (Some(current), Some(required)) => current >= required,
            _ => false,
        }
    }

    /// Roles a blocking edge may name in `unblockAt`
    pub fn is_valid_unblock_role(&self) -> bool {
        matches!(self, Self::Work | Self::Review | Self::Terminal)
    }
}

impl fmt::Display for StatusRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queue => write!(f, "queue"),
            Self::Work => write!(f, "work"),
            Self::Review => write!(f, "review"),
            Self::Blocked => write!(f, "blocked"),
            Self::Terminal => write!(f, "terminal"),
        }
    }
}

impl std::str::FromStr for StatusRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queue" => Ok(Self::Queue),
            "work" => Ok(Self::Work),
            "review" => Ok(Self::Review),
            "blocked" => Ok(Self::Blocked),
            "terminal" => Ok(Self::Terminal),
            _ => Err(format!("Invalid status role: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: Uuid,
    pub title: String,
    pub status: Status,
    pub summary: Option<String>,
    pub feature_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl TaskRecord {
    /// Summary length in characters; a missing summary counts as empty
    pub fn summary_length(&self) -> usize {
        self.summary
            .as_deref()
            .map(|summary| summary.chars().count())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub id: Uuid,
    pub name: String,
    pub status: Status,
    pub project_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: Uuid,
    pub name: String,
    pub status: Status,
    pub created_at: DateTime<Utc>,
}
