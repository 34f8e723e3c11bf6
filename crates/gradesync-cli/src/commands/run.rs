//! Run command - executes a command script.

use std::path::Path;

use anyhow::{Context, Result};
use gradesync::script::{ScriptRunner, load_script};

use super::open_cluster;
use crate::style::colors::SemanticStyle;
use crate::style::{print_spacer, print_success, print_warn};

pub fn run(project: &Path, script: &Path) -> Result<()> {
    let commands = load_script(script)
        .with_context(|| format!("Failed to load script {}", script.display()))?;
    let (config, cluster) = open_cluster(project)?;

    let summary = ScriptRunner::new(&cluster)
        .with_pacing(config.pacing())
        .run(&commands, |step| {
            let line = format!("{:>4}", step.line.line).muted();
            match &step.result {
                Ok(_) => println!("{line} {step}"),
                Err(_) => println!("{line} {}", step.to_string().error()),
            }
        });

    print_spacer();
    if summary.failed == 0 {
        print_success(&format!("{} commands executed", summary.executed));
        Ok(())
    } else {
        print_warn(&format!(
            "{} commands executed, {} failed",
            summary.executed, summary.failed
        ));
        anyhow::bail!("{} script commands failed", summary.failed)
    }
}
