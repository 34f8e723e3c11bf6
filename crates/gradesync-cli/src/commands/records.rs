//! Records command - prints a replica's grade records.

use std::path::Path;

use anyhow::{Context, Result};
use gradesync::ReplicaName;

use super::{ListFormat, open_cluster};
use crate::style::print_data_table;

pub fn run(project: &Path, replica: &ReplicaName, format: ListFormat) -> Result<()> {
    let (_, cluster) = open_cluster(project)?;
    let records = cluster
        .records(replica)
        .with_context(|| format!("Failed to read records of {replica}"))?;

    match format {
        ListFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        ListFormat::Text => {
            let rows: Vec<Vec<String>> = records
                .iter()
                .map(|r| {
                    vec![
                        r.key.student_id.to_string(),
                        r.key.course_id.to_string(),
                        r.grade.to_string(),
                    ]
                })
                .collect();
            print_data_table(&["student", "course", "grade"], &rows, "No records.");
        }
    }
    Ok(())
}
