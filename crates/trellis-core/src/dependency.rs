use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::descriptor::ArtifactDescriptor;
use crate::module::{ModuleId, ModuleRevisionId};

/// Wildcard accepted on either side of a configuration mapping and in
/// exclusion rules.
pub const WILDCARD: &str = "*";

/// A dependency declaration: which module is wanted, how the declaring
/// module's configurations map onto the target's, and what to leave out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DependencyDescriptor {
    /// The requested module. The revision may be dynamic (`1.+`, `[1.0,2.0)`).
    #[serde(rename = "module")]
    pub requested: ModuleRevisionId,
    #[serde(default, rename = "conf")]
    pub configurations: ConfigurationMapping,
    #[serde(default = "default_transitive")]
    pub transitive: bool,
    #[serde(default, rename = "exclude")]
    pub excludes: Vec<ExcludeRule>,
    /// Explicit artifacts. When empty, the target configuration's own
    /// artifacts are used.
    #[serde(default)]
    pub artifacts: Vec<ArtifactDescriptor>,
    /// Also include the target configuration's artifacts when explicit
    /// artifacts are listed.
    #[serde(default)]
    pub include_default_artifacts: bool,
}

fn default_transitive() -> bool {
    true
}

impl DependencyDescriptor {
    pub fn new(requested: ModuleRevisionId) -> Self {
        Self {
            requested,
            configurations: ConfigurationMapping::default(),
            transitive: true,
            excludes: Vec::new(),
            artifacts: Vec::new(),
            include_default_artifacts: false,
        }
    }

    pub fn with_configurations(mut self, mapping: ConfigurationMapping) -> Self {
        self.configurations = mapping;
        self
    }

    pub fn non_transitive(mut self) -> Self {
        self.transitive = false;
        self
    }

    pub fn exclude(mut self, rule: ExcludeRule) -> Self {
        self.excludes.push(rule);
        self
    }

    pub fn with_artifact(mut self, artifact: ArtifactDescriptor) -> Self {
        self.artifacts.push(artifact);
        self
    }

    pub fn include_default_artifacts(mut self, include: bool) -> Self {
        self.include_default_artifacts = include;
        self
    }

    /// Target configuration names reached from a source configuration whose
    /// extends-hierarchy is `source_hierarchy`.
    pub fn target_configurations(&self, source_hierarchy: &IndexSet<String>) -> IndexSet<String> {
        self.configurations.target_configurations(source_hierarchy)
    }

    /// Whether any exclusion rule of this declaration, evaluated from the given
    /// source hierarchy, suppresses `module`.
    pub fn excludes_module(&self, module: &ModuleId, source_hierarchy: &IndexSet<String>) -> bool {
        self.excludes
            .iter()
            .any(|rule| rule.applies_from(source_hierarchy) && rule.matches(module))
    }

    /// Explicit artifacts that apply from the given source hierarchy.
    pub fn dependency_artifacts<'a>(
        &'a self,
        source_hierarchy: &'a IndexSet<String>,
    ) -> impl Iterator<Item = &'a ArtifactDescriptor> + 'a {
        self.artifacts.iter().filter(move |artifact| {
            artifact.configurations.is_empty()
                || artifact
                    .configurations
                    .iter()
                    .any(|c| c == WILDCARD || source_hierarchy.contains(c))
        })
    }
}

/// Module-configuration to dependency-configuration mapping, written
/// `"compile->default;runtime->runtime,master"`.
///
/// A bare name maps to itself (`"compile"` is `"compile->compile"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConfigurationMapping {
    entries: IndexMap<String, Vec<String>>,
}

impl Default for ConfigurationMapping {
    /// `*->default`: every source configuration pulls the target's `default`.
    fn default() -> Self {
        let mut entries = IndexMap::new();
        entries.insert(WILDCARD.to_string(), vec!["default".to_string()]);
        Self { entries }
    }
}

impl ConfigurationMapping {
    pub fn parse(spec: &str) -> Result<Self, String> {
        let mut entries: IndexMap<String, Vec<String>> = IndexMap::new();
        for part in spec.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (left, right) = match part.split_once("->") {
                Some((l, r)) => (l, Some(r)),
                None => (part, None),
            };
            let module_confs = split_names(left);
            if module_confs.is_empty() {
                return Err(format!("missing module configuration in `{part}`"));
            }
            for module_conf in module_confs {
                let targets = match right {
                    Some(r) => split_names(r),
                    None => vec![module_conf.clone()],
                };
                if targets.is_empty() {
                    return Err(format!("missing dependency configuration in `{part}`"));
                }
                let slot = entries.entry(module_conf).or_default();
                for target in targets {
                    if !slot.contains(&target) {
                        slot.push(target);
                    }
                }
            }
        }
        if entries.is_empty() {
            return Err("empty configuration mapping".to_string());
        }
        Ok(Self { entries })
    }

    /// Module-side configuration names, in declaration order.
    pub fn module_configurations(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Dependency-side configuration names for one module-side name.
    pub fn dependency_configurations(&self, module_conf: &str) -> &[String] {
        self.entries
            .get(module_conf)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Union of the dependency-side names of every entry whose module side is
    /// `*` or part of `source_hierarchy`. A `*` target is kept literally.
    pub fn target_configurations(&self, source_hierarchy: &IndexSet<String>) -> IndexSet<String> {
        let mut targets = IndexSet::new();
        for (module_conf, dependency_confs) in &self.entries {
            if module_conf == WILDCARD || source_hierarchy.contains(module_conf) {
                targets.extend(dependency_confs.iter().cloned());
            }
        }
        targets
    }
}

fn split_names(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl fmt::Display for ConfigurationMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (module_conf, dependency_confs) in &self.entries {
            if !first {
                f.write_str(";")?;
            }
            first = false;
            write!(f, "{module_conf}->{}", dependency_confs.join(","))?;
        }
        Ok(())
    }
}

impl TryFrom<String> for ConfigurationMapping {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ConfigurationMapping> for String {
    fn from(value: ConfigurationMapping) -> Self {
        value.to_string()
    }
}

/// Suppresses a module coordinate from the subtree below the declaring edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludeRule {
    #[serde(default = "wildcard")]
    pub organization: String,
    #[serde(default = "wildcard")]
    pub module: String,
    /// Source configurations the rule applies from. Empty means all.
    #[serde(default, rename = "conf")]
    pub configurations: Vec<String>,
}

fn wildcard() -> String {
    WILDCARD.to_string()
}

impl ExcludeRule {
    /// Exclude one module coordinate from every source configuration.
    pub fn module(id: &ModuleId) -> Self {
        Self {
            organization: id.organization.clone(),
            module: id.name.clone(),
            configurations: Vec::new(),
        }
    }

    /// Exclude every module of an organization.
    pub fn organization(organization: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            module: wildcard(),
            configurations: Vec::new(),
        }
    }

    /// Restrict the rule to the given source configurations.
    pub fn from_configurations<I, S>(mut self, configurations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.configurations = configurations.into_iter().map(Into::into).collect();
        self
    }

    pub fn matches(&self, module: &ModuleId) -> bool {
        (self.organization == WILDCARD || self.organization == module.organization)
            && (self.module == WILDCARD || self.module == module.name)
    }

    pub fn applies_from(&self, source_hierarchy: &IndexSet<String>) -> bool {
        self.configurations.is_empty()
            || self
                .configurations
                .iter()
                .any(|c| c == WILDCARD || source_hierarchy.contains(c))
    }
}
