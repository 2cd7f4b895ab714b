//! Configuration types for ds-migrate
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation

use crate::error::ConfigError;
use crate::migrate::{MigrationOptions, UnresolvedAcePolicy};
use clap::Parser;
use std::path::PathBuf;

/// Maximum reasonable worker count
const MAX_WORKERS: usize = 512;

/// Default audit log file
pub const DEFAULT_LOG_FILE: &str = "ds-migrate.log";

/// Re-map file ownership and ACLs after a directory-service migration
#[derive(Parser, Debug, Clone)]
#[command(
    name = "ds-migrate",
    version,
    about = "Re-map POSIX owners, groups and ACLs from a source to a target directory service",
    long_about = "Reads users and groups from the source and target directory nodes on the \
                  search path, joins them by name, then walks every root and rewrites owner, \
                  group and ACL entries to the target's ids. Orphaned ACL entries are removed.\n\n\
                  The search path must list the local node, then the target, then the source.",
    after_help = "EXAMPLES:\n    \
        ds-migrate /Volumes/Shares -n                # dry-run, log what would change\n    \
        ds-migrate /Volumes/Shares --pool -w 16 -y   # 16 workers, no prompt\n    \
        ds-migrate /Volumes/A /Volumes/B --swap -n   # test the reverse direction"
)]
pub struct CliArgs {
    /// Directories to migrate
    #[arg(value_name = "ROOTS", required = true)]
    pub roots: Vec<PathBuf>,

    /// Number of worker threads (used with --pool)
    #[arg(
        short = 'w',
        long,
        default_value_t = default_workers(),
        value_name = "NUM"
    )]
    pub workers: usize,

    /// Migrate paths on a pool of worker threads
    #[arg(long)]
    pub pool: bool,

    /// Debug-level detail in the log file
    #[arg(long)]
    pub debug: bool,

    /// Swap source and target (test runs)
    #[arg(long)]
    pub swap: bool,

    /// Log every change without making it
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Do not ask for confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Verbose console output
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Audit log file
    #[arg(long, default_value = DEFAULT_LOG_FILE, value_name = "FILE")]
    pub log_file: PathBuf,

    /// Leave ACL entries whose principal is unknown to the target untouched
    #[arg(long)]
    pub skip_unresolved_aces: bool,

    /// Run chown/chmod/chflags without sudo
    #[arg(long)]
    pub no_sudo: bool,
}

fn default_workers() -> usize {
    // Units spend most of their time waiting on child processes
    num_cpus::get() * 2
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct MigrateConfig {
    /// Directories to migrate, in order
    pub roots: Vec<PathBuf>,

    /// Number of worker threads
    pub worker_count: usize,

    /// Use the worker pool (otherwise inline, sequential)
    pub use_pool: bool,

    /// Debug logging to file
    pub debug: bool,

    /// Verbose console logging
    pub verbose: bool,

    /// Show progress indicator
    pub show_progress: bool,

    /// Swap source and target after discovery
    pub swap: bool,

    /// Skip the confirmation prompt
    pub auto_confirm: bool,

    /// Prefix mutation tools with sudo
    pub use_sudo: bool,

    /// Audit log path
    pub log_file: PathBuf,

    /// Options handed to every worker
    pub options: MigrationOptions,
}

impl MigrateConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        if args.workers == 0 || args.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: args.workers,
                max: MAX_WORKERS,
            });
        }

        if let Some(parent) = args.log_file.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(ConfigError::InvalidLogPath {
                    path: args.log_file.clone(),
                    reason: format!("Parent directory '{}' does not exist", parent.display()),
                });
            }
        }

        let unresolved_aces = if args.skip_unresolved_aces {
            UnresolvedAcePolicy::Skip
        } else {
            UnresolvedAcePolicy::Rewrite
        };

        Ok(Self {
            roots: args.roots,
            worker_count: args.workers,
            use_pool: args.pool,
            debug: args.debug,
            verbose: args.verbose,
            show_progress: !args.quiet,
            swap: args.swap,
            auto_confirm: args.yes,
            use_sudo: !args.no_sudo,
            log_file: args.log_file,
            options: MigrationOptions {
                dry_run: args.dry_run,
                unresolved_aces,
            },
        })
    }

    /// Workers actually used
    pub fn effective_workers(&self) -> usize {
        if self.use_pool {
            self.worker_count
        } else {
            1
        }
    }

    /// Short description of the run mode for the header
    pub fn mode(&self) -> &'static str {
        match (self.options.dry_run, self.effective_workers() > 1) {
            (true, true) => "dry-run, parallel",
            (true, false) => "dry-run, sequential",
            (false, true) => "live, parallel",
            (false, false) => "live, sequential",
        }
    }
}
