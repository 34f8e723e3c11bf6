//! gradesync command-line interface.
//!
//! Drives a set of grade replicas configured in `gradesync.toml`.
//!
//! # Quick Start
//!
//! ```bash
//! # Create gradesync.toml and load a snapshot into every replica
//! gradesync init --csv student_course_grades.csv
//!
//! # Write on one replica, then pull it into another
//! gradesync set HIVE SID1033 CSE016 A
//! gradesync merge SQL HIVE
//! gradesync get SQL SID1033 CSE016
//!
//! # Replay a command script
//! gradesync run testcase.in
//! ```

mod commands;
mod style;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use gradesync::ReplicaName;
use tracing_subscriber::EnvFilter;

use crate::commands::ListFormat;
use crate::commands::config::ConfigFormat;

/// gradesync - last-writer-wins replication of student grades.
#[derive(Parser)]
#[command(name = "gradesync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory containing gradesync.toml.
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// Initialize a project and optionally bootstrap every replica.
    Init {
        /// CSV snapshot to load into every replica.
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Read a grade from one replica.
    Get {
        /// Replica name (HIVE, MONGO, SQL, ...).
        replica: ReplicaName,
        /// Student identifier.
        student: String,
        /// Course identifier.
        course: String,
    },

    /// Update an existing grade on one replica.
    Set {
        /// Replica name.
        replica: ReplicaName,
        /// Student identifier.
        student: String,
        /// Course identifier.
        course: String,
        /// New grade.
        grade: String,
    },

    /// Pull the source replica's writes into the target.
    Merge {
        /// Replica that receives newer writes.
        target: ReplicaName,
        /// Replica whose oplog is read.
        source: ReplicaName,

        /// Output format.
        #[arg(short, long, value_enum, default_value = "text")]
        format: ListFormat,
    },

    /// Execute a command script.
    Run {
        /// Path to the script.
        script: PathBuf,
    },

    /// Print a replica's operation log.
    Oplog {
        /// Replica name.
        replica: ReplicaName,

        /// Only show SET entries.
        #[arg(long)]
        sets_only: bool,

        /// Output format.
        #[arg(short, long, value_enum, default_value = "text")]
        format: ListFormat,
    },

    /// Print a replica's grade records.
    Records {
        /// Replica name.
        replica: ReplicaName,

        /// Output format.
        #[arg(short, long, value_enum, default_value = "text")]
        format: ListFormat,
    },

    /// Configuration commands.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration.
    Show {
        /// Output format.
        #[arg(short, long, value_enum, default_value = "text")]
        format: ConfigFormat,
    },
}

fn main() {
    let cli = Cli::parse();

    style::set_no_color(cli.no_color || std::env::var_os("NO_COLOR").is_some());

    // Logs go to stderr so command output stays pipeable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(!style::no_color())
        .init();

    if let Err(err) = dispatch(cli) {
        style::print_error(&format!("{err:#}"));
        std::process::exit(1);
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    let project = cli.project.as_path();
    match cli.command {
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
        Commands::Init { csv } => commands::init::run(project, csv.as_deref()),
        Commands::Get {
            replica,
            student,
            course,
        } => commands::get::run(project, &replica, &student, &course),
        Commands::Set {
            replica,
            student,
            course,
            grade,
        } => commands::set::run(project, &replica, &student, &course, &grade),
        Commands::Merge {
            target,
            source,
            format,
        } => commands::merge::run(project, &target, &source, format),
        Commands::Run { script } => commands::run::run(project, &script),
        Commands::Oplog {
            replica,
            sets_only,
            format,
        } => commands::oplog::run(project, &replica, sets_only, format),
        Commands::Records { replica, format } => commands::records::run(project, &replica, format),
        Commands::Config(ConfigCommands::Show { format }) => commands::config::show(project, format),
    }
}
