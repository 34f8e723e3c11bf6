//! Oplog command - prints a replica's operation log.

use std::path::Path;

use anyhow::{Context, Result};
use gradesync::{LogFilter, ReplicaName};

use super::{ListFormat, open_cluster};
use crate::style::print_data_table;

pub fn run(project: &Path, replica: &ReplicaName, sets_only: bool, format: ListFormat) -> Result<()> {
    let (_, cluster) = open_cluster(project)?;
    let filter = if sets_only {
        LogFilter::Sets
    } else {
        LogFilter::All
    };

    let entries = cluster
        .oplog(replica, filter)
        .with_context(|| format!("Failed to read oplog of {replica}"))?;

    match format {
        ListFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        ListFormat::Text => {
            let rows: Vec<Vec<String>> = entries
                .iter()
                .map(|entry| {
                    vec![
                        entry.timestamp.to_string(),
                        entry.kind().to_string(),
                        entry.key.student_id.to_string(),
                        entry.key.course_id.to_string(),
                        entry.new_grade().map(ToString::to_string).unwrap_or_default(),
                        entry.origin.to_string(),
                    ]
                })
                .collect();
            print_data_table(
                &["timestamp", "op", "student", "course", "grade", "origin"],
                &rows,
                "Oplog is empty.",
            );
        }
    }
    Ok(())
}
