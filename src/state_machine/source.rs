//! Workflow document sources.
//!
//! A source turns a working context into an optional [`WorkflowDocument`]. `Ok(None)`
//! means "no document here", which the config cache answers with the built-in workflow.

use super::workflow::{ValidationRules, WorkflowSpec};
use crate::config::{ConfigResult, ConfigurationError, WorkflowSourceConfig};
use crate::constants::defaults;
use crate::models::EntityKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Identity of the working context a workflow document belongs to
///
/// The cache keys freshness on [`ConfigContext::fingerprint`]; switching context forces a
/// reload even inside the TTL window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigContext {
    root: PathBuf,
}

impl ConfigContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn fingerprint(&self) -> String {
        self.root.to_string_lossy().into_owned()
    }
}

/// One entity kind's entry under `status_progression`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KindProgression {
    pub default_flow: Vec<String>,
    pub emergency_transitions: Vec<String>,
    pub terminal_statuses: Vec<String>,
    pub status_roles: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusProgression {
    pub tasks: Option<KindProgression>,
    pub features: Option<KindProgression>,
    pub projects: Option<KindProgression>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationRulesDocument {
    pub enforce_sequential: Option<bool>,
    pub allow_backward: Option<bool>,
    pub allow_emergency: Option<bool>,
    pub validate_prerequisites: Option<bool>,
}

/// Parsed workflow document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowDocument {
    pub status_progression: StatusProgression,
    pub status_validation: ValidationRulesDocument,
}

impl WorkflowDocument {
    pub fn progression(&self, kind: EntityKind) -> Option<&KindProgression> {
        match kind {
            EntityKind::Task => self.status_progression.tasks.as_ref(),
            EntityKind::Feature => self.status_progression.features.as_ref(),
            EntityKind::Project => self.status_progression.projects.as_ref(),
        }
    }

    /// Spec for `kind`; a kind the document leaves out keeps the built-in workflow, with the
    /// document's validation rules applied
    pub fn spec_for(&self, kind: EntityKind) -> ConfigResult<WorkflowSpec> {
        let rules = ValidationRules::from(&self.status_validation);
        match self.progression(kind) {
            Some(progression) => WorkflowSpec::from_progression(kind, progression, rules),
            None => Ok(WorkflowSpec {
                rules,
                ..WorkflowSpec::built_in(kind)
            }),
        }
    }

    pub fn from_yaml(file_path: &str, contents: &str) -> ConfigResult<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents).map_err(|err| ConfigurationError::invalid_yaml(file_path, err))
    }
}

#[async_trait]
pub trait WorkflowConfigSource: Send + Sync + std::fmt::Debug {
    /// Load the document for `context`, `Ok(None)` when there is none
    async fn load(&self, context: &ConfigContext) -> ConfigResult<Option<WorkflowDocument>>;
}

/// Reads `<context root>/<config_dir>/<config_file>` from disk
#[derive(Debug, Clone)]
pub struct YamlFileConfigSource {
    relative_path: PathBuf,
    max_bytes: u64,
}

impl YamlFileConfigSource {
    pub fn new(config: &WorkflowSourceConfig) -> Self {
        Self {
            relative_path: config.relative_path(),
            max_bytes: defaults::MAX_WORKFLOW_CONFIG_BYTES,
        }
    }

    pub fn path_for(&self, context: &ConfigContext) -> PathBuf {
        context.root().join(&self.relative_path)
    }
}

impl Default for YamlFileConfigSource {
    fn default() -> Self {
        Self::new(&WorkflowSourceConfig::default())
    }
}

#[async_trait]
impl WorkflowConfigSource for YamlFileConfigSource {
    async fn load(&self, context: &ConfigContext) -> ConfigResult<Option<WorkflowDocument>> {
        let path = self.path_for(context);
        let shown = path.display().to_string();

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %shown, "No workflow document found");
                return Ok(None);
            }
            Err(err) => return Err(ConfigurationError::file_read_error(shown, err)),
        };

        if !metadata.is_file() {
            return Err(ConfigurationError::file_read_error(
                shown,
                "workflow document path is not a regular file",
            ));
        }
        if metadata.len() > self.max_bytes {
            return Err(ConfigurationError::invalid_value(
                "workflow document size",
                metadata.len().to_string(),
                format!("exceeds the {} byte limit", self.max_bytes),
            ));
        }

        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| ConfigurationError::file_read_error(&shown, err))?;
        WorkflowDocument::from_yaml(&shown, &contents).map(Some)
    }
}
