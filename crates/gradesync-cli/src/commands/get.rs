//! Get command - reads one grade.

use std::path::Path;

use anyhow::{Context, Result};
use gradesync::{GradeKey, ReplicaName};

use super::open_cluster;
use crate::style::colors::SemanticStyle;

pub fn run(project: &Path, replica: &ReplicaName, student: &str, course: &str) -> Result<()> {
    let key = GradeKey::parse(student, course)?;
    let (_, cluster) = open_cluster(project)?;

    let grade = cluster
        .get(replica, &key)
        .with_context(|| format!("GET {key} on {replica} failed"))?;
    match grade {
        Some(grade) => println!("{grade}"),
        None => println!("{}", "not found".muted()),
    }
    Ok(())
}
