//! Migration coordinator - runs the walker against the worker pool
//!
//! The coordinator is responsible for:
//! - Starting the pool and enumerating every root into it
//! - Draining the pool once, at the very end
//! - Progress reporting
//! - Signal handling (graceful shutdown)
//! - Final statistics

use super::pool::{aggregate_stats, WorkerPool};
use super::tree::TreeWalker;
use crate::error::Result;
use crate::migrate::MigrationContext;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct MigrationResult {
    /// Paths migrated (including ones with failed operations)
    pub paths: u64,

    /// Paths with at least one failure
    pub failed: u64,

    /// Paths that needed the immutable flag cleared
    pub unlocked: u64,

    /// Operations applied, or echoed in dry-run
    pub operations: u64,

    /// Queued paths dropped after an interrupt
    pub discarded: u64,

    /// Roots that did not exist
    pub roots_skipped: u64,

    /// Entries that could not be enumerated
    pub walk_errors: u64,

    /// Time taken for the run
    pub duration: Duration,

    /// Whether the run completed (vs was interrupted)
    pub completed: bool,
}

impl MigrationResult {
    pub fn paths_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.paths as f64 / secs
        } else {
            0.0
        }
    }
}

/// Coordinates enumeration and migration of every root
pub struct MigrationCoordinator {
    context: MigrationContext,
    roots: Vec<PathBuf>,
    worker_count: usize,
    threaded: bool,
    shutdown: Arc<AtomicBool>,
}

impl MigrationCoordinator {
    /// Create a coordinator; `threaded == false` runs every unit inline
    pub fn new(
        context: MigrationContext,
        roots: Vec<PathBuf>,
        worker_count: usize,
        threaded: bool,
    ) -> Self {
        Self {
            context,
            roots,
            worker_count,
            threaded,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a clone of the shutdown flag (for signal handlers)
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Run the migration
    pub fn run(&self) -> Result<MigrationResult> {
        self.execute(|_| {})
    }

    /// Run the migration, reporting progress every 100ms
    pub fn run_with_progress<F>(&self, progress_callback: F) -> Result<MigrationResult>
    where
        F: Fn(MigrationProgress) + Send + 'static,
    {
        let done = Arc::new(AtomicBool::new(false));
        let mut reporter: Option<JoinHandle<()>> = None;

        let result = self.execute(|pool| {
            let stats = pool.stats_handles();
            let done = Arc::clone(&done);
            let start = Instant::now();

            let spawned = thread::Builder::new()
                .name("progress".into())
                .spawn(move || {
                    while !done.load(Ordering::Relaxed) {
                        let totals = aggregate_stats(&stats);
                        progress_callback(MigrationProgress {
                            paths: totals.processed,
                            failed: totals.failed,
                            unlocked: totals.unlocked,
                            elapsed: start.elapsed(),
                        });
                        thread::sleep(Duration::from_millis(100));
                    }
                });
            match spawned {
                Ok(handle) => reporter = Some(handle),
                Err(e) => warn!(error = %e, "Progress reporting unavailable"),
            }
        });

        done.store(true, Ordering::SeqCst);
        if let Some(handle) = reporter {
            let _ = handle.join();
        }

        result
    }

    fn execute<F>(&self, on_start: F) -> Result<MigrationResult>
    where
        F: FnOnce(&WorkerPool),
    {
        let start = Instant::now();
        let started_at: DateTime<Utc> = Utc::now();

        info!(
            start_time = %started_at.to_rfc3339(),
            roots = self.roots.len(),
            workers = self.worker_count,
            pool = self.threaded,
            dry_run = self.context.options.dry_run,
            "Starting migration"
        );

        let pool = WorkerPool::new(
            self.context.clone(),
            self.worker_count,
            self.threaded,
            Arc::clone(&self.shutdown),
        )?;
        on_start(&pool);

        let walker = TreeWalker::new(self.roots.clone(), Arc::clone(&self.shutdown));
        let walk = walker.walk(&pool);

        // Drain before surfacing any walk error
        let stats = pool.finish();
        let walk = walk?;

        let duration = start.elapsed();
        let completed = !walk.interrupted && !self.shutdown.load(Ordering::Relaxed);

        info!(
            end_time = %Utc::now().to_rfc3339(),
            submitted = walk.submitted,
            paths = stats.processed,
            failed = stats.failed,
            unlocked = stats.unlocked,
            discarded = stats.discarded,
            roots_skipped = walk.roots_skipped,
            duration_secs = duration.as_secs(),
            completed,
            "Migration finished"
        );

        Ok(MigrationResult {
            paths: stats.processed,
            failed: stats.failed,
            unlocked: stats.unlocked,
            operations: stats.operations,
            discarded: stats.discarded,
            roots_skipped: walk.roots_skipped,
            walk_errors: walk.walk_errors,
            duration,
            completed,
        })
    }
}

/// Progress information for display
#[derive(Debug, Clone, Default)]
pub struct MigrationProgress {
    /// Paths finished
    pub paths: u64,

    /// Paths with failures
    pub failed: u64,

    /// Paths that were unlocked
    pub unlocked: u64,

    /// Elapsed time
    pub elapsed: Duration,
}

impl MigrationProgress {
    /// Calculate paths per second rate
    pub fn paths_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.paths as f64 / secs
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_rate() {
        let progress = MigrationProgress {
            paths: 1000,
            elapsed: Duration::from_secs(10),
            ..Default::default()
        };
        assert!((progress.paths_per_second() - 100.0).abs() < 0.1);

        let idle = MigrationProgress::default();
        assert_eq!(idle.paths_per_second(), 0.0);
    }
}
