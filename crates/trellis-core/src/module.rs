use std::fmt;

use serde::{Deserialize, Serialize};

/// A module coordinate: `organization:name`, independent of version.
///
/// All revisions sharing a coordinate compete with each other during conflict
/// resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleId {
    pub organization: String,
    pub name: String,
}

impl ModuleId {
    pub fn new(organization: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            name: name.into(),
        }
    }

    /// Parse `"organization:name"`.
    pub fn parse(s: &str) -> Option<Self> {
        let (organization, name) = s.split_once(':')?;
        if organization.is_empty() || name.is_empty() || name.contains(':') {
            return None;
        }
        Some(Self::new(organization, name))
    }

    /// Attach a revision to this coordinate.
    pub fn at(&self, revision: impl Into<String>) -> ModuleRevisionId {
        ModuleRevisionId {
            module: self.clone(),
            revision: revision.into(),
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.organization, self.name)
    }
}

impl TryFrom<String> for ModuleId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("expected `organization:name`, got `{value}`"))
    }
}

impl From<ModuleId> for String {
    fn from(value: ModuleId) -> Self {
        value.to_string()
    }
}

/// One concrete (or requested, possibly dynamic) revision of a module:
/// `organization:name:revision`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleRevisionId {
    pub module: ModuleId,
    pub revision: String,
}

impl ModuleRevisionId {
    pub fn new(
        organization: impl Into<String>,
        name: impl Into<String>,
        revision: impl Into<String>,
    ) -> Self {
        Self {
            module: ModuleId::new(organization, name),
            revision: revision.into(),
        }
    }

    /// Parse `"organization:name:revision"`.
    ///
    /// The revision part may itself contain `:`-free range syntax such as
    /// `[1.0,2.0)`.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.splitn(3, ':');
        let organization = parts.next()?;
        let name = parts.next()?;
        let revision = parts.next()?;
        if organization.is_empty()
            || name.is_empty()
            || revision.is_empty()
            || revision.contains(':')
        {
            return None;
        }
        Some(Self::new(organization, name, revision))
    }

    pub fn organization(&self) -> &str {
        &self.module.organization
    }

    pub fn name(&self) -> &str {
        &self.module.name
    }

    /// Stable string encoding used as a persistent cache key.
    ///
    /// Unlike `Display`, every component is length-prefixed so that no two
    /// distinct ids can encode to the same string.
    pub fn encode(&self) -> String {
        format!(
            "{}#{}{}#{}{}#{}",
            self.module.organization.len(),
            self.module.organization,
            self.module.name.len(),
            self.module.name,
            self.revision.len(),
            self.revision
        )
    }

    /// Copy of this id pointing at a different revision of the same module.
    pub fn with_revision(&self, revision: impl Into<String>) -> Self {
        self.module.at(revision)
    }
}

impl fmt::Display for ModuleRevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.revision)
    }
}

impl TryFrom<String> for ModuleRevisionId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
            .ok_or_else(|| format!("expected `organization:name:revision`, got `{value}`"))
    }
}

impl From<ModuleRevisionId> for String {
    fn from(value: ModuleRevisionId) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_is_unambiguous() {
        let a = ModuleRevisionId::new("a:b", "c", "1");
        let b = ModuleRevisionId::new("a", "b:c", "1");
        assert_ne!(a.encode(), b.encode());
    }

    #[test]
    fn with_revision_keeps_module() {
        let id = ModuleRevisionId::new("org.example", "lib", "1.+");
        let concrete = id.with_revision("1.4");
        assert_eq!(concrete.module, id.module);
        assert_eq!(concrete.revision, "1.4");
    }
}
