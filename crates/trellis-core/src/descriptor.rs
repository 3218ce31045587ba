use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dependency::{DependencyDescriptor, WILDCARD};
use crate::module::ModuleRevisionId;

/// Name of the configuration every module has when it declares none.
pub const DEFAULT_CONFIGURATION: &str = "default";

/// Metadata for one module revision: its configurations, published
/// artifacts, and declared dependencies.
///
/// Modules can be written as TOML:
///
/// ```toml
/// module = "org.example:app:1.0"
///
/// [[configurations]]
/// name = "compile"
///
/// [[configurations]]
/// name = "runtime"
/// extends = ["compile"]
///
/// [[dependencies]]
/// module = "org.example:lib:1.+"
/// conf = "compile->default"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    #[serde(rename = "module")]
    pub id: ModuleRevisionId,
    #[serde(default)]
    pub configurations: Vec<ConfigurationDescriptor>,
    #[serde(default)]
    pub artifacts: Vec<ArtifactDescriptor>,
    #[serde(default)]
    pub dependencies: Vec<DependencyDescriptor>,
}

impl ModuleDescriptor {
    pub fn new(id: ModuleRevisionId) -> Self {
        Self {
            id,
            configurations: Vec::new(),
            artifacts: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_configuration(mut self, configuration: ConfigurationDescriptor) -> Self {
        self.configurations.push(configuration);
        self
    }

    pub fn with_artifact(mut self, artifact: ArtifactDescriptor) -> Self {
        self.artifacts.push(artifact);
        self
    }

    pub fn with_dependency(mut self, dependency: DependencyDescriptor) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Load a module descriptor from a TOML file.
    pub fn from_path(path: &Path) -> miette::Result<Self> {
        tracing::debug!("Loading module descriptor from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            trellis_util::errors::TrellisError::Config {
                message: format!("Failed to read {}: {e}", path.display()),
            }
        })?;
        Self::parse_toml(&content)
    }

    /// Parse a module descriptor from TOML.
    pub fn parse_toml(content: &str) -> miette::Result<Self> {
        toml::from_str(content).map_err(|e| {
            trellis_util::errors::TrellisError::Config {
                message: format!("Failed to parse module descriptor: {e}"),
            }
            .into()
        })
    }

    /// Serialize the descriptor back to TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn has_configuration(&self, name: &str) -> bool {
        self.extends_of(name).is_some()
    }

    /// Configurations directly extended by `name`, or `None` if the module
    /// does not declare it.
    pub fn extends_of(&self, name: &str) -> Option<&[String]> {
        if self.configurations.is_empty() {
            let none: &[String] = &[];
            return (name == DEFAULT_CONFIGURATION).then_some(none);
        }
        self.configurations
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.extends.as_slice())
    }

    /// Names of every public configuration, in declaration order.
    pub fn public_configuration_names(&self) -> Vec<String> {
        if self.configurations.is_empty() {
            return vec![DEFAULT_CONFIGURATION.to_string()];
        }
        self.configurations
            .iter()
            .filter(|c| c.visibility == Visibility::Public)
            .map(|c| c.name.clone())
            .collect()
    }

    /// Artifacts published in configuration `name` (not its parents).
    ///
    /// A module declaring no artifacts publishes a single `<name>.jar` in
    /// every configuration.
    pub fn artifacts_for(&self, name: &str) -> Vec<ArtifactDescriptor> {
        if self.artifacts.is_empty() {
            return vec![ArtifactDescriptor::new(self.id.name())];
        }
        self.artifacts
            .iter()
            .filter(|a| {
                a.configurations.is_empty()
                    || a.configurations.iter().any(|c| c == WILDCARD || c == name)
            })
            .cloned()
            .collect()
    }

    /// Expand a requested target configuration into concrete names.
    ///
    /// - `*` expands to every public configuration.
    /// - `name(fallback)` resolves to `name` when declared, otherwise to
    ///   `fallback` (which may itself be `*`).
    /// - Anything else is returned as is, declared or not.
    pub fn real_configurations(&self, requested: &str) -> Vec<String> {
        let requested = requested.trim();
        if requested == WILDCARD {
            return self.public_configuration_names();
        }
        if let Some((name, rest)) = requested.split_once('(') {
            let fallback = rest.trim_end_matches(')').trim();
            let name = name.trim();
            if self.has_configuration(name) || fallback.is_empty() {
                return vec![name.to_string()];
            }
            return self.real_configurations(fallback);
        }
        vec![requested.to_string()]
    }
}

/// Whether a configuration may be targeted from other modules via `*`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// A named, extensible bucket of dependencies and artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationDescriptor {
    pub name: String,
    #[serde(default)]
    pub extends: Vec<String>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub description: Option<String>,
}

impl ConfigurationDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extends: Vec::new(),
            visibility: Visibility::Public,
            description: None,
        }
    }

    pub fn extends<I, S>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extends.extend(parents.into_iter().map(Into::into));
        self
    }

    pub fn private(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }
}

/// A published (or explicitly requested) artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    pub name: String,
    #[serde(default = "default_kind", rename = "type")]
    pub kind: String,
    #[serde(default = "default_kind", rename = "ext")]
    pub extension: String,
    #[serde(default)]
    pub classifier: Option<String>,
    /// Configurations the artifact belongs to. Empty means all.
    #[serde(default, rename = "conf")]
    pub configurations: Vec<String>,
}

fn default_kind() -> String {
    "jar".to_string()
}

impl ArtifactDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: default_kind(),
            extension: default_kind(),
            classifier: None,
            configurations: Vec::new(),
        }
    }

    pub fn with_type(mut self, kind: impl Into<String>, extension: impl Into<String>) -> Self {
        self.kind = kind.into();
        self.extension = extension.into();
        self
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    pub fn in_configurations<I, S>(mut self, configurations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.configurations = configurations.into_iter().map(Into::into).collect();
        self
    }

    /// File name within a repository layout: `name-rev[-classifier].ext`.
    pub fn file_name(&self, revision: &str) -> String {
        match &self.classifier {
            Some(c) => format!("{}-{revision}-{c}.{}", self.name, self.extension),
            None => format!("{}-{revision}.{}", self.name, self.extension),
        }
    }
}
