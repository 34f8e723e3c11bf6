//! Version command implementation.

use crate::style::colors::SemanticStyle;
use crate::style::{print_labeled, print_spacer};

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn run() {
    println!("{} {}", "gradesync".header(), VERSION);
    println!("{}", "Last-writer-wins replication of student grades.".muted());
    print_spacer();
    print_labeled("Target", std::env::consts::ARCH);
    print_labeled("OS", std::env::consts::OS);
}
