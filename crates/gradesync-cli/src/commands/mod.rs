//! CLI command implementations.

use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use gradesync::{Cluster, GradesyncConfig};
use gradesync_config::is_initialized;

pub mod config;
pub mod get;
pub mod init;
pub mod merge;
pub mod oplog;
pub mod records;
pub mod run;
pub mod set;
pub mod version;

/// Output format for listing commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ListFormat {
    Text,
    Json,
}

/// Loads the project's configuration, failing if `gradesync init` has not
/// been run there.
pub fn load_config(project: &Path) -> Result<GradesyncConfig> {
    if !is_initialized(project) {
        anyhow::bail!(
            "Project not initialized. Run 'gradesync init' in {} first.",
            project.display()
        );
    }
    GradesyncConfig::load_from_dir(project).context("Failed to load configuration")
}

/// Opens every configured replica of the project.
pub fn open_cluster(project: &Path) -> Result<(GradesyncConfig, Cluster)> {
    let config = load_config(project)?;
    let cluster = Cluster::open(&config).context("Failed to open replicas")?;
    Ok((config, cluster))
}
