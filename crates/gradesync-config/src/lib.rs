//! Configuration management for gradesync
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (GRADESYNC_* prefix, highest precedence)
//! 2. gradesync.local.toml (gitignored, local overrides)
//! 3. gradesync.toml (git-tracked, project config)
//! 4. ~/.config/gradesync/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)

use anyhow::Result;
use gradesync_types::{BackendKind, ReplicaName};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::{ConfigLoader, is_initialized, project_config_file};

/// Main gradesync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GradesyncConfig {
    pub project: ProjectConfig,
    pub data: DataConfig,
    pub merge: MergeConfig,
    pub script: ScriptConfig,
    pub replicas: Vec<ReplicaConfig>,
}

impl Default for GradesyncConfig {
    fn default() -> Self {
        Self {
            project: ProjectConfig::default(),
            data: DataConfig::default(),
            merge: MergeConfig::default(),
            script: ScriptConfig::default(),
            replicas: ReplicaConfig::defaults(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "gradesync-project".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Root under which each replica gets its own directory.
    pub dir: PathBuf,
    /// CSV snapshot used by `init` when no path is given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap_csv: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".gradesync/data"),
            bootstrap_csv: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Budget for fetching a source replica's oplog.
    pub fetch_timeout_ms: u64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Pause between consecutive script commands.
    pub pacing_ms: u64,
}

/// One replica of the deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaConfig {
    pub name: ReplicaName,
    pub backend: BackendKind,
    /// Storage directory; defaults to `{data.dir}/{lowercase name}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl ReplicaConfig {
    pub fn new(name: ReplicaName, backend: BackendKind) -> Self {
        Self {
            name,
            backend,
            path: None,
        }
    }

    /// The reference deployment: HIVE, MONGO and SQL.
    pub fn defaults() -> Vec<Self> {
        [
            ("HIVE", BackendKind::Delimited),
            ("MONGO", BackendKind::Document),
            ("SQL", BackendKind::Table),
        ]
        .into_iter()
        .filter_map(|(name, backend)| {
            ReplicaName::new(name)
                .ok()
                .map(|name| Self::new(name, backend))
        })
        .collect()
    }
}

impl GradesyncConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Create a configuration whose replicas all live in memory
    pub fn in_memory() -> Self {
        Self {
            replicas: ReplicaConfig::defaults()
                .into_iter()
                .map(|r| ReplicaConfig::new(r.name, BackendKind::Memory))
                .collect(),
            ..Default::default()
        }
    }

    /// Resolve relative paths to absolute
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();

        if self.data.dir.is_relative() {
            self.data.dir = base.join(&self.data.dir);
        }

        if let Some(csv) = &self.data.bootstrap_csv {
            if csv.is_relative() {
                self.data.bootstrap_csv = Some(base.join(csv));
            }
        }

        for replica in &mut self.replicas {
            if let Some(path) = &replica.path {
                if path.is_relative() {
                    replica.path = Some(base.join(path));
                }
            }
        }
    }

    /// Checks invariants the loader cannot express in types.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.replicas.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one replica must be configured".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for replica in &self.replicas {
            if !seen.insert(&replica.name) {
                return Err(ConfigError::ValidationError(format!(
                    "replica {} is configured more than once",
                    replica.name
                )));
            }
        }

        if self.merge.fetch_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "merge.fetch_timeout_ms must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Storage directory for `replica`.
    pub fn replica_path(&self, replica: &ReplicaConfig) -> PathBuf {
        replica.path.clone().unwrap_or_else(|| {
            self.data
                .dir
                .join(replica.name.as_str().to_ascii_lowercase())
        })
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.merge.fetch_timeout_ms)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.script.pacing_ms)
    }

    /// Renders the configuration as a `gradesync.toml` document.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }
}
