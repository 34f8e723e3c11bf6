//! Merge command - pulls one replica's writes into another.

use std::path::Path;

use anyhow::{Context, Result};
use gradesync::{MergeReport, ReplicaName};

use super::{ListFormat, open_cluster};
use crate::style::colors::SemanticStyle;
use crate::style::{print_data_table, print_labeled, print_success, print_warn};

pub fn run(
    project: &Path,
    target: &ReplicaName,
    source: &ReplicaName,
    format: ListFormat,
) -> Result<()> {
    let (_, cluster) = open_cluster(project)?;

    let report = cluster
        .merge(target, source)
        .with_context(|| format!("MERGE {source} into {target} failed"))?;
    match format {
        ListFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        ListFormat::Text => print_report(target, &report),
    }
    ensure_restored(target, &report)
}

/// Fails when an apply left a target record its oplog does not explain.
fn ensure_restored(target: &ReplicaName, report: &MergeReport) -> Result<()> {
    if report.has_unrestored() {
        anyhow::bail!(
            "MERGE {} into {target} left records on {target} that its oplog does not explain",
            report.source
        );
    }
    Ok(())
}

/// Prints a merge report: the counts, then one row per failed key.
fn print_report(target: &ReplicaName, report: &MergeReport) {
    let summary = format!(
        "{} <- {}: {} merged",
        target.info(),
        report.source.info(),
        report.merged
    );
    if report.is_clean() {
        print_success(&summary);
    } else {
        print_warn(&format!("{summary}, {} failed", report.failures.len()));
    }
    print_labeled("considered", &report.considered.to_string());
    print_labeled("stale", &report.stale.to_string());

    if !report.failures.is_empty() {
        let rows: Vec<Vec<String>> = report
            .failures
            .iter()
            .map(|f| {
                vec![
                    f.key.student_id.to_string(),
                    f.key.course_id.to_string(),
                    f.reason.to_string(),
                ]
            })
            .collect();
        print_data_table(&["student", "course", "reason"], &rows, "");
    }
}
