use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Resolver configuration loaded from `~/.trellis/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default)]
    pub resolution: ResolutionConfig,

    #[serde(default)]
    pub cache: RevisionCacheConfig,
}

/// Resolution behaviour from `[resolution]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionConfig {
    #[serde(default, rename = "conflict-strategy")]
    pub conflict_strategy: ConflictStrategyKind,
    /// Fail the whole call when any dependency is unresolved.
    #[serde(default)]
    pub strict: bool,
}

/// How the winning revision of a conflicted module is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictStrategyKind {
    /// Highest revision by Maven version ordering.
    #[default]
    Latest,
    /// Highest revision by plain string comparison.
    LatestLexico,
}

/// Dynamic revision cache settings from `[cache]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionCacheConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_cache_file")]
    pub file: String,
    #[serde(default = "default_ttl", rename = "dynamic-ttl-secs")]
    pub dynamic_ttl_secs: u64,
    #[serde(default = "default_lock_timeout", rename = "lock-timeout-secs")]
    pub lock_timeout_secs: u64,
}

impl Default for RevisionCacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            file: default_cache_file(),
            dynamic_ttl_secs: default_ttl(),
            lock_timeout_secs: default_lock_timeout(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_cache_file() -> String {
    dirs_path()
        .join("dynamic-revisions.json")
        .to_string_lossy()
        .into_owned()
}

fn default_ttl() -> u64 {
    24 * 60 * 60
}

fn default_lock_timeout() -> u64 {
    10
}

impl RevisionCacheConfig {
    /// Cache file path with `~` expanded.
    pub fn file_path(&self) -> PathBuf {
        trellis_util::fs::expand_home(&self.file)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.dynamic_ttl_secs)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }
}

impl ResolverConfig {
    /// Load the configuration from the default location, or return defaults
    /// if the file doesn't exist.
    pub fn load() -> miette::Result<Self> {
        let path = Self::default_path();
        if path.is_file() {
            Self::from_path(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load the configuration from a specific file.
    pub fn from_path(path: &Path) -> miette::Result<Self> {
        tracing::debug!("Loading resolver config from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            trellis_util::errors::TrellisError::Config {
                message: format!("Failed to read {}: {e}", path.display()),
            }
        })?;
        Self::parse_toml(&content)
    }

    pub fn parse_toml(content: &str) -> miette::Result<Self> {
        toml::from_str(content).map_err(|e| {
            trellis_util::errors::TrellisError::Config {
                message: format!("Failed to parse resolver config: {e}"),
            }
            .into()
        })
    }

    /// Returns the default path to the config file.
    pub fn default_path() -> PathBuf {
        dirs_path().join("config.toml")
    }
}

/// Returns the Trellis data directory: `$TRELLIS_HOME`, or `~/.trellis/`.
pub fn dirs_path() -> PathBuf {
    if let Ok(home) = std::env::var("TRELLIS_HOME") {
        if !home.is_empty() {
            return PathBuf::from(home);
        }
    }
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".trellis")
}
