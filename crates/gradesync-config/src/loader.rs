//! Configuration loader with multi-source merging

use crate::{GradesyncConfig, ReplicaConfig};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::env;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "GRADESYNC";
const PROJECT_CONFIG_FILE: &str = "gradesync.toml";
const LOCAL_CONFIG_FILE: &str = "gradesync.local.toml";

/// Project config file path (gradesync.toml)
pub fn project_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
    project_dir.as_ref().join(PROJECT_CONFIG_FILE)
}

/// Check if a project is initialized (has gradesync.toml)
pub fn is_initialized(project_dir: impl AsRef<Path>) -> bool {
    project_config_file(project_dir).exists()
}

/// Local config file path (gradesync.local.toml, gitignored)
fn local_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
    project_dir.as_ref().join(LOCAL_CONFIG_FILE)
}

/// User config file (~/.config/gradesync/config.toml), if the platform
/// reports a config directory
fn user_config_file() -> Option<PathBuf> {
    ProjectDirs::from("org", "gradesync", "gradesync")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    user_config: bool,
}

impl ConfigLoader {
    /// Create a new config loader with default project directory (current dir)
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            user_config: true,
        }
    }

    /// Set the project directory
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Skip ~/.config/gradesync/config.toml
    pub fn without_user_config(mut self) -> Self {
        self.user_config = false;
        self
    }

    /// Load configuration from all sources with proper precedence
    ///
    /// Environment keys use `__` between path segments, so
    /// `GRADESYNC_MERGE__FETCH_TIMEOUT_MS=100` sets `merge.fetch_timeout_ms`.
    pub fn load(self) -> Result<GradesyncConfig> {
        let mut builder = config::Config::builder();

        // 1. Start with built-in defaults. The replica list is filled in after
        //    merging so a file that lists replicas replaces it instead of
        //    being merged into it entry by entry.
        let defaults = GradesyncConfig {
            replicas: Vec::new(),
            ..GradesyncConfig::default()
        };
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. User config (~/.config/gradesync/config.toml)
        let user_config_file = user_config_file()
            .filter(|file| self.user_config && file.exists());
        if let Some(user_config_file) = user_config_file {
            builder = builder.add_source(
                config::File::from(user_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 3. Project config (gradesync.toml)
        let project_config_file = project_config_file(&self.project_dir);
        if project_config_file.exists() {
            builder = builder.add_source(
                config::File::from(project_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 4. Local config (gradesync.local.toml, gitignored)
        let local_config_file = local_config_file(&self.project_dir);
        if local_config_file.exists() {
            builder = builder.add_source(
                config::File::from(local_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 5. Environment variables (GRADESYNC_*)
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // Build and deserialize
        let config = builder.build().context("Failed to build configuration")?;

        let mut gradesync_config: GradesyncConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        if gradesync_config.replicas.is_empty() {
            gradesync_config.replicas = ReplicaConfig::defaults();
        }

        // Resolve relative paths
        gradesync_config.resolve_paths(&self.project_dir);

        gradesync_config
            .validate()
            .context("Invalid configuration")?;

        Ok(gradesync_config)
    }

}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
