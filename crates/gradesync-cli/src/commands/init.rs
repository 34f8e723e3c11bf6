//! Initialize command - creates a project and bootstraps its replicas.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use gradesync::{Cluster, GradesyncConfig, bootstrap};
use gradesync_config::project_config_file;

use crate::style::{print_hint, print_spacer, print_success};

const GITIGNORE: &str = "# gradesync replica data
.gradesync/

# Local config overrides (not tracked in git)
gradesync.local.toml
";

pub fn run(project: &Path, csv: Option<&Path>) -> Result<()> {
    fs::create_dir_all(project).context("Failed to create project directory")?;

    let config_path = project_config_file(project);
    if config_path.exists() {
        print_hint("gradesync.toml already exists, keeping it");
    } else {
        let content = GradesyncConfig::default()
            .to_toml()
            .context("Failed to serialize configuration")?;
        fs::write(&config_path, content).context("Failed to write gradesync.toml")?;
        print_success("Wrote gradesync.toml");

        let gitignore_path = project.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(&gitignore_path, GITIGNORE).context("Failed to write .gitignore")?;
        }
    }

    let config = GradesyncConfig::load_from_dir(project).context("Failed to load configuration")?;
    fs::create_dir_all(&config.data.dir).context("Failed to create data directory")?;
    let cluster = Cluster::open(&config).context("Failed to open replicas")?;
    print_success(&format!(
        "Opened {} replicas in {}",
        config.replicas.len(),
        config.data.dir.display()
    ));

    let snapshot = csv.map(Path::to_path_buf).or(config.data.bootstrap_csv.clone());
    match snapshot {
        Some(path) => {
            let records = bootstrap::read_csv(&path)
                .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
            cluster
                .bootstrap(&records)
                .context("Failed to bootstrap replicas")?;
            print_success(&format!(
                "Loaded {} records from {} into every replica",
                records.len(),
                path.display()
            ));
        }
        None => {
            print_spacer();
            print_hint("No snapshot given. Load one with 'gradesync init --csv <file>'.");
        }
    }

    Ok(())
}
