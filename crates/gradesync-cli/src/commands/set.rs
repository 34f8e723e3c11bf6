//! Set command - updates one existing grade.

use std::path::Path;

use anyhow::{Context, Result};
use gradesync::{Grade, GradeKey, ReplicaName, SetOutcome};

use super::open_cluster;
use crate::style::colors::SemanticStyle;
use crate::style::print_success;

pub fn run(
    project: &Path,
    replica: &ReplicaName,
    student: &str,
    course: &str,
    grade: &str,
) -> Result<()> {
    let key = GradeKey::parse(student, course)?;
    let grade = Grade::new(grade)?;
    let (_, cluster) = open_cluster(project)?;

    let outcome = cluster
        .set(replica, &key, &grade)
        .with_context(|| format!("SET {key} on {replica} failed"))?;
    match outcome {
        SetOutcome::Applied => {
            print_success(&format!("{} {key} = {grade}", replica.info()));
            Ok(())
        }
        SetOutcome::NotFound => anyhow::bail!("no record for {key} on {replica}, nothing updated"),
    }
}
