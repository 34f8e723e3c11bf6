//! Configuration commands.

use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;

use super::load_config;
use crate::style::colors::SemanticStyle;
use crate::style::{print_info_table, print_spacer};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    Text,
    Toml,
    Json,
}

/// Show the effective configuration.
pub fn show(project: &Path, format: ConfigFormat) -> Result<()> {
    let config = load_config(project)?;

    match format {
        ConfigFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        ConfigFormat::Toml => println!(
            "{}",
            config.to_toml().context("Failed to serialize configuration")?
        ),
        ConfigFormat::Text => {
            println!("{}", "gradesync configuration".header());
            print_spacer();
            print_info_table(&[
                ("project", config.project.name.clone()),
                ("data dir", config.data.dir.display().to_string()),
                (
                    "bootstrap csv",
                    config
                        .data
                        .bootstrap_csv
                        .as_ref()
                        .map_or_else(|| "none".to_string(), |p| p.display().to_string()),
                ),
                ("fetch timeout", format!("{} ms", config.merge.fetch_timeout_ms)),
                ("script pacing", format!("{} ms", config.script.pacing_ms)),
            ]);
            print_spacer();
            println!("{}", "Replicas".header());
            for replica in &config.replicas {
                println!(
                    "  {:<8} {:<10} {}",
                    replica.name.info(),
                    replica.backend.to_string(),
                    config.replica_path(replica).display().to_string().muted()
                );
            }
        }
    }
    Ok(())
}
