//! Bounded worker pool for migration units
//!
//! Each worker takes one path at a time from a bounded crossbeam channel
//! and migrates it end to end. Submission blocks only while the channel is
//! full; callers never wait for an individual unit.
//!
//! With a single worker, or with threading disabled, units run inline on
//! the submitting thread, strictly in submission order.

use crate::error::{UnitOutcome, WorkerError};
use crate::migrate::{migrate_path, MigrationContext};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace, warn};

/// Queue slots per worker
const QUEUE_DEPTH_PER_WORKER: usize = 64;

/// Counters for the units one worker has handled
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Units taken from the queue and run
    pub processed: AtomicU64,

    /// Units with at least one failed operation, or that failed inspection
    pub failed: AtomicU64,

    /// Units that needed the immutable flag cleared
    pub unlocked: AtomicU64,

    /// Operations applied (or echoed in dry-run)
    pub operations: AtomicU64,

    /// Units dropped from the queue after shutdown
    pub discarded: AtomicU64,
}

impl WorkerStats {
    fn record(&self, outcome: &UnitOutcome) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        if !outcome.is_success() {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        if let UnitOutcome::Migrated {
            applied, unlocked, ..
        } = outcome
        {
            self.operations.fetch_add(*applied as u64, Ordering::Relaxed);
            if *unlocked {
                self.unlocked.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn record_discard(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time sum of every worker's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub processed: u64,
    pub failed: u64,
    pub unlocked: u64,
    pub operations: u64,
    pub discarded: u64,
}

/// Sum the counters of several workers
pub fn aggregate_stats(stats: &[Arc<WorkerStats>]) -> PoolStats {
    stats.iter().fold(PoolStats::default(), |acc, s| PoolStats {
        processed: acc.processed + s.processed.load(Ordering::Relaxed),
        failed: acc.failed + s.failed.load(Ordering::Relaxed),
        unlocked: acc.unlocked + s.unlocked.load(Ordering::Relaxed),
        operations: acc.operations + s.operations.load(Ordering::Relaxed),
        discarded: acc.discarded + s.discarded.load(Ordering::Relaxed),
    })
}

/// A worker thread that migrates queued paths
struct Worker {
    id: usize,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn(
        id: usize,
        context: MigrationContext,
        queue: Receiver<PathBuf>,
        shutdown: Arc<AtomicBool>,
        stats: Arc<WorkerStats>,
    ) -> Result<Self, WorkerError> {
        let handle = thread::Builder::new()
            .name(format!("migrate-{}", id))
            .spawn(move || worker_loop(id, context, queue, shutdown, stats))
            .map_err(|e| WorkerError::InitFailed {
                id,
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
        })
    }

    fn join(mut self) -> Result<(), WorkerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| WorkerError::Panicked {
                id: self.id,
                message: "Worker thread panicked".into(),
            }),
            None => Ok(()),
        }
    }
}

fn worker_loop(
    id: usize,
    context: MigrationContext,
    queue: Receiver<PathBuf>,
    shutdown: Arc<AtomicBool>,
    stats: Arc<WorkerStats>,
) {
    debug!(worker = id, "Worker starting");

    // Runs until every sender is dropped and the queue is empty
    for path in queue.iter() {
        if shutdown.load(Ordering::Relaxed) {
            stats.record_discard();
            continue;
        }
        let outcome = migrate_path(&context, &path);
        trace!(worker = id, path = %path.display(), success = outcome.is_success(), "Unit done");
        stats.record(&outcome);
    }

    debug!(
        worker = id,
        processed = stats.processed.load(Ordering::Relaxed),
        "Worker shutting down"
    );
}

/// Where submitted units go
pub trait UnitSink {
    /// Hand off one path for migration
    fn submit(&self, path: PathBuf) -> Result<(), WorkerError>;
}

/// Runs migration units, threaded or inline
pub struct WorkerPool {
    context: MigrationContext,
    sender: Option<Sender<PathBuf>>,
    workers: Vec<Worker>,
    stats: Vec<Arc<WorkerStats>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Start a pool
    ///
    /// `threaded == false` or `worker_count <= 1` gives inline execution.
    pub fn new(
        context: MigrationContext,
        worker_count: usize,
        threaded: bool,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Self, WorkerError> {
        let mut pool = Self {
            context,
            sender: None,
            workers: Vec::new(),
            stats: Vec::new(),
            shutdown,
        };

        if !threaded || worker_count <= 1 {
            pool.stats.push(Arc::new(WorkerStats::default()));
            debug!("Running units inline");
            return Ok(pool);
        }

        let (sender, receiver) = bounded(worker_count * QUEUE_DEPTH_PER_WORKER);
        for id in 0..worker_count {
            let stats = Arc::new(WorkerStats::default());
            let worker = Worker::spawn(
                id,
                pool.context.clone(),
                receiver.clone(),
                Arc::clone(&pool.shutdown),
                Arc::clone(&stats),
            )?;
            pool.workers.push(worker);
            pool.stats.push(stats);
        }
        pool.sender = Some(sender);

        info!(count = worker_count, "Workers spawned");
        Ok(pool)
    }

    /// Whether units run on worker threads
    pub fn is_threaded(&self) -> bool {
        self.sender.is_some()
    }

    /// Shared counter handles, for live progress
    pub fn stats_handles(&self) -> Vec<Arc<WorkerStats>> {
        self.stats.clone()
    }

    /// Wait for every submitted unit, then stop the workers
    pub fn finish(mut self) -> PoolStats {
        drop(self.sender.take());

        for worker in std::mem::take(&mut self.workers) {
            if let Err(e) = worker.join() {
                warn!(error = %e, "Worker failed to join cleanly");
            }
        }

        aggregate_stats(&self.stats)
    }
}

impl UnitSink for WorkerPool {
    fn submit(&self, path: PathBuf) -> Result<(), WorkerError> {
        match &self.sender {
            Some(sender) => sender.send(path).map_err(|_| WorkerError::QueueClosed),
            None => {
                let outcome = migrate_path(&self.context, &path);
                self.stats[0].record(&outcome);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{IdentityMap, MergedIdentity, MergedIdentityTable, RecordCategory};
    use crate::error::{ToolError, ToolResult};
    use crate::migrate::MigrationOptions;
    use crate::tools::{PathTools, ToolCommand};
    use std::path::Path;
    use std::sync::Mutex;

    /// Every path is owned by alice with no ACL; `missing` paths fail to list
    #[derive(Default)]
    struct FakeTools {
        commands: Mutex<Vec<PathBuf>>,
    }

    impl PathTools for FakeTools {
        fn list(&self, path: &Path) -> ToolResult<String> {
            if path.ends_with("missing") {
                return Err(ToolError::Failed {
                    program: "ls".into(),
                    status: "1".into(),
                    stderr: "No such file or directory".into(),
                });
            }
            Ok(format!(
                "-rw-r--r-- 1 alice wheel 0 Jun 30 10:00 {}\n",
                path.display()
            ))
        }

        fn run(&self, _command: &ToolCommand, path: &Path) -> ToolResult<()> {
            self.commands.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }

        fn set_immutable(&self, _path: &Path, _immutable: bool) -> ToolResult<()> {
            Ok(())
        }
    }

    fn context(tools: Arc<FakeTools>) -> MigrationContext {
        let mut users = MergedIdentityTable::new(RecordCategory::Users);
        users.insert(
            "alice".into(),
            MergedIdentity {
                source_id: 1001,
                target_id: 5001,
            },
        );
        MigrationContext::new(
            Arc::new(IdentityMap::new(
                users,
                MergedIdentityTable::new(RecordCategory::Groups),
            )),
            tools,
            MigrationOptions::default(),
        )
    }

    #[test]
    fn test_worker_stats() {
        let stats = WorkerStats::default();
        stats.record(&UnitOutcome::Migrated {
            path: "/a".into(),
            applied: 3,
            unlocked: true,
            failed: 0,
        });
        stats.record(&UnitOutcome::Migrated {
            path: "/b".into(),
            applied: 1,
            unlocked: false,
            failed: 1,
        });
        stats.record_discard();

        let totals = aggregate_stats(&[Arc::new(stats)]);
        assert_eq!(totals.processed, 2);
        assert_eq!(totals.failed, 1);
        assert_eq!(totals.unlocked, 1);
        assert_eq!(totals.operations, 4);
        assert_eq!(totals.discarded, 1);
    }

    #[test]
    fn test_inline_pool_runs_in_order() {
        let tools = Arc::new(FakeTools::default());
        let pool = WorkerPool::new(
            context(tools.clone()),
            8,
            false,
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap();
        assert!(!pool.is_threaded());

        for name in ["a", "b", "c"] {
            pool.submit(PathBuf::from(format!("/Shares/{name}"))).unwrap();
        }
        let stats = pool.finish();

        assert_eq!(stats.processed, 3);
        assert_eq!(
            *tools.commands.lock().unwrap(),
            vec![
                PathBuf::from("/Shares/a"),
                PathBuf::from("/Shares/b"),
                PathBuf::from("/Shares/c")
            ]
        );
    }

    #[test]
    fn test_threaded_pool_drains() {
        let tools = Arc::new(FakeTools::default());
        let pool = WorkerPool::new(
            context(tools.clone()),
            4,
            true,
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap();
        assert!(pool.is_threaded());

        for i in 0..500 {
            pool.submit(PathBuf::from(format!("/Shares/{i}"))).unwrap();
        }
        pool.submit(PathBuf::from("/Shares/missing")).unwrap();
        let stats = pool.finish();

        assert_eq!(stats.processed, 501);
        assert_eq!(stats.failed, 1);
        assert_eq!(tools.commands.lock().unwrap().len(), 500);
    }

    #[test]
    fn test_shutdown_discards_queued_units() {
        let tools = Arc::new(FakeTools::default());
        let shutdown = Arc::new(AtomicBool::new(true));
        let pool = WorkerPool::new(context(tools.clone()), 2, true, shutdown).unwrap();

        for i in 0..10 {
            pool.submit(PathBuf::from(format!("/Shares/{i}"))).unwrap();
        }
        let stats = pool.finish();

        assert_eq!(stats.processed, 0);
        assert_eq!(stats.discarded, 10);
        assert!(tools.commands.lock().unwrap().is_empty());
    }
}
