use std::time::Duration;

use colored::Colorize;

/// Counts of the filesystem effects performed during one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
    pub renamed: usize,
    pub moved: usize,
    pub deleted: usize,
    pub conflicts: usize,
    pub failures: usize,
}

impl CleanupStats {
    /// Combine counts from two independently processed directories.
    #[must_use]
    pub const fn merged(mut self, other: Self) -> Self {
        self.renamed += other.renamed;
        self.moved += other.moved;
        self.deleted += other.deleted;
        self.conflicts += other.conflicts;
        self.failures += other.failures;
        self
    }

    #[must_use]
    pub const fn nothing_happened(&self) -> bool {
        self.renamed == 0 && self.moved == 0 && self.deleted == 0 && self.conflicts == 0 && self.failures == 0
    }

    pub fn print_summary(&self, elapsed: Duration, dryrun: bool) {
        if dryrun {
            println!("{}", "Dryrun: no files were changed".cyan().bold());
        }
        if self.renamed > 0 {
            println!(
                "{}",
                format!("Renamed {} kept file(s) to remove the timestamp", self.renamed).green()
            );
        }
        if self.moved > 0 {
            println!("{}", format!("Moved {} file(s) to quarantine", self.moved).yellow());
        }
        if self.deleted > 0 {
            println!("{}", format!("Deleted {} file(s)", self.deleted).red());
        }
        if self.conflicts > 0 {
            println!("{}", format!("Skipped {} name conflict(s)", self.conflicts).yellow());
        }
        if self.failures > 0 {
            println!("{}", format!("{} operation(s) failed", self.failures).red().bold());
        }
        if self.nothing_happened() {
            println!("No files affected");
        }
        println!("Done in {}", fhclean::format_duration(elapsed));
    }
}
