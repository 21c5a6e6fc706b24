//! Built-in status vocabularies for each entity kind.
//!
//! These back the fallback workflow used when no workflow document is present. A workflow
//! document may add statuses beyond these; such statuses exist only as [`Status`] values.

use crate::models::{EntityKind, Status, StatusRole};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! status_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            pub fn to_status(&self) -> Status {
                Status::from_canonical(self.as_str())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let canonical = crate::validation::normalize_status(s)?;
                match canonical.as_str() {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("Invalid ", $label, " status: {}"), s)),
                }
            }
        }
    };
}

status_enum! {
    /// Task lifecycle statuses
    TaskStatus, "task" {
        Backlog => "BACKLOG",
        Pending => "PENDING",
        InProgress => "IN_PROGRESS",
        InReview => "IN_REVIEW",
        ChangesRequested => "CHANGES_REQUESTED",
        Testing => "TESTING",
        ReadyForQa => "READY_FOR_QA",
        Investigating => "INVESTIGATING",
        Blocked => "BLOCKED",
        OnHold => "ON_HOLD",
        Deployed => "DEPLOYED",
        Completed => "COMPLETED",
        Cancelled => "CANCELLED",
        Deferred => "DEFERRED",
    }
}

status_enum! {
    /// Feature lifecycle statuses
    FeatureStatus, "feature" {
        Draft => "DRAFT",
        Planning => "PLANNING",
        InDevelopment => "IN_DEVELOPMENT",
        Testing => "TESTING",
        Validating => "VALIDATING",
        PendingReview => "PENDING_REVIEW",
        Blocked => "BLOCKED",
        OnHold => "ON_HOLD",
        Deployed => "DEPLOYED",
        Completed => "COMPLETED",
        Archived => "ARCHIVED",
    }
}

status_enum! {
    /// Project lifecycle statuses
    ProjectStatus, "project" {
        Planning => "PLANNING",
        InDevelopment => "IN_DEVELOPMENT",
        OnHold => "ON_HOLD",
        Cancelled => "CANCELLED",
        Completed => "COMPLETED",
        Archived => "ARCHIVED",
    }
}

/// Canonical names of the built-in statuses for `kind`, in declaration order
pub fn built_in_statuses(kind: EntityKind) -> Vec<&'static str> {
    match kind {
        EntityKind::Task => TaskStatus::ALL.iter().map(TaskStatus::as_str).collect(),
        EntityKind::Feature => FeatureStatus::ALL.iter().map(FeatureStatus::as_str).collect(),
        EntityKind::Project => ProjectStatus::ALL.iter().map(ProjectStatus::as_str).collect(),
    }
}

/// Role of a non-terminal status when the workflow document does not assign one
///
/// Terminal membership is decided by the workflow, not by name, so it is not handled here.
pub fn default_role(status: &Status) -> StatusRole {
    match status.as_str() {
        "BLOCKED" | "ON_HOLD" => StatusRole::Blocked,
        "IN_PROGRESS" | "INVESTIGATING" | "CHANGES_REQUESTED" | "IN_DEVELOPMENT" => {
            StatusRole::Work
        }
        "IN_REVIEW" | "TESTING" | "READY_FOR_QA" | "VALIDATING" | "PENDING_REVIEW"
        | "DEPLOYED" => StatusRole::Review,
        _ => StatusRole::Queue,
    }
}
