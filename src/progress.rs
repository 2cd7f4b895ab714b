//! Progress reporting for a migration run
//!
//! Provides real-time progress display using indicatif progress bars.

use crate::directory::IdentityResolution;
use crate::walker::{MigrationProgress, MigrationResult};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

/// Progress reporter that displays run status
#[derive(Clone)]
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .expect("Invalid progress template")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display
    pub fn update(&self, progress: &MigrationProgress) {
        let msg = format!(
            "Paths: {} | Failed: {} | Unlocked: {} | Rate: {:.0}/s",
            format_number(progress.paths),
            format_number(progress.failed),
            format_number(progress.unlocked),
            progress.paths_per_second(),
        );

        self.bar.set_message(msg);
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| {
            chunk
                .iter()
                .rev()
                .map(|&b| b as char)
                .collect::<String>()
        })
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print a header at the start of the run
pub fn print_header(source: &str, target: &str, roots: &[PathBuf], workers: usize, mode: &str) {
    println!();
    println!(
        "{} {}",
        style("ds-migrate").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Source:").bold(), source);
    println!("  {} {}", style("Target:").bold(), target);
    for root in roots {
        println!("  {} {}", style("Root:").bold(), root.display());
    }
    println!("  {} {}", style("Workers:").bold(), workers);
    println!("  {} {}", style("Mode:").bold(), mode);
    println!();
}

/// Print merged identity counts
pub fn print_identities(resolution: &IdentityResolution) {
    println!(
        "  {} {} merged, {} missing on target",
        style("Users:").bold(),
        format_number(resolution.identities.users.len() as u64),
        format_number(resolution.missing_users.len() as u64)
    );
    println!(
        "  {} {} merged, {} missing on target",
        style("Groups:").bold(),
        format_number(resolution.identities.groups.len() as u64),
        format_number(resolution.missing_groups.len() as u64)
    );
    println!();
}

/// Print a summary of the run
pub fn print_summary(result: &MigrationResult, dry_run: bool, log_file: &str) {
    let title = match (result.completed, dry_run) {
        (true, false) => style("Migration Complete").green().bold(),
        (true, true) => style("Dry Run Complete").green().bold(),
        (false, _) => style("Migration Interrupted").yellow().bold(),
    };

    println!();
    println!("{}", title);
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Paths:").bold(), format_number(result.paths));
    println!(
        "  {} {}",
        style("Operations:").bold(),
        format_number(result.operations)
    );
    if result.unlocked > 0 {
        println!(
            "  {} {}",
            style("Unlocked:").bold(),
            format_number(result.unlocked)
        );
    }
    println!(
        "  {} {:.1}s ({:.0} paths/sec)",
        style("Duration:").bold(),
        result.duration.as_secs_f64(),
        result.paths_per_second()
    );
    for (label, count) in problem_counts(result) {
        println!(
            "  {} {}",
            style(label).yellow().bold(),
            format_number(count)
        );
    }
    println!("  {} {}", style("Log:").bold(), log_file);
    println!();
}

/// Non-zero problem counters, in display order
fn problem_counts(result: &MigrationResult) -> Vec<(&'static str, u64)> {
    [
        ("Failed:", result.failed),
        ("Roots skipped:", result.roots_skipped),
        ("Unreadable entries:", result.walk_errors),
        ("Not migrated:", result.discarded),
    ]
    .into_iter()
    .filter(|(_, count)| *count > 0)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> MigrationResult {
        MigrationResult {
            paths: 10,
            failed: 0,
            unlocked: 0,
            operations: 20,
            discarded: 0,
            roots_skipped: 0,
            walk_errors: 0,
            duration: Duration::from_secs(1),
            completed: true,
        }
    }

    #[test]
    fn test_clean_run_has_no_problem_counts() {
        assert!(problem_counts(&result()).is_empty());
    }

    #[test]
    fn test_problem_counts_include_unreadable_entries() {
        let mut r = result();
        r.roots_skipped = 1;
        r.walk_errors = 3;
        r.failed = 2;

        assert_eq!(
            problem_counts(&r),
            vec![
                ("Failed:", 2),
                ("Roots skipped:", 1),
                ("Unreadable entries:", 3),
            ]
        );
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
        assert_eq!(format_number(1234567890), "1,234,567,890");
    }
}
