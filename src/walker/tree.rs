//! Root enumeration
//!
//! For every root: the root itself is one unit, then every descendant file
//! and directory is one unit. Symlinks are not followed; a link is
//! migrated as a path of its own.

use super::pool::UnitSink;
use crate::error::WorkerError;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Totals for one enumeration pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkSummary {
    /// Units handed to the sink
    pub submitted: u64,

    /// Roots that did not exist
    pub roots_skipped: u64,

    /// Entries that could not be read during enumeration
    pub walk_errors: u64,

    /// Enumeration stopped on the shutdown flag
    pub interrupted: bool,
}

/// Enumerates roots into migration units
pub struct TreeWalker {
    roots: Vec<PathBuf>,
    shutdown: Arc<AtomicBool>,
}

impl TreeWalker {
    pub fn new(roots: Vec<PathBuf>, shutdown: Arc<AtomicBool>) -> Self {
        Self { roots, shutdown }
    }

    /// Submit every unit under every root to `sink`
    pub fn walk<S: UnitSink + ?Sized>(&self, sink: &S) -> Result<WalkSummary, WorkerError> {
        let mut summary = WalkSummary::default();

        for root in &self.roots {
            if self.is_shutdown() {
                summary.interrupted = true;
                break;
            }
            if !root.exists() {
                warn!(root = %root.display(), "Root does not exist, skipping");
                summary.roots_skipped += 1;
                continue;
            }

            info!(root = %root.display(), "Migrating root");
            self.walk_root(root, sink, &mut summary)?;
        }

        Ok(summary)
    }

    fn walk_root<S: UnitSink + ?Sized>(
        &self,
        root: &Path,
        sink: &S,
        summary: &mut WalkSummary,
    ) -> Result<(), WorkerError> {
        sink.submit(root.to_path_buf())?;
        summary.submitted += 1;

        for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
            if self.is_shutdown() {
                summary.interrupted = true;
                debug!(root = %root.display(), "Enumeration stopped");
                return Ok(());
            }

            match entry {
                Ok(entry) => {
                    sink.submit(entry.into_path())?;
                    summary.submitted += 1;
                }
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "Cannot read entry");
                    summary.walk_errors += 1;
                }
            }
        }

        Ok(())
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<PathBuf>>);

    impl UnitSink for Collect {
        fn submit(&self, path: PathBuf) -> Result<(), WorkerError> {
            self.0.lock().unwrap().push(path);
            Ok(())
        }
    }

    #[test]
    fn test_walk_submits_root_and_descendants() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("share");
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::write(root.join("a.txt"), b"a").unwrap();
        fs::write(root.join("sub/b.txt"), b"b").unwrap();

        let sink = Collect::default();
        let walker = TreeWalker::new(vec![root.clone()], Arc::new(AtomicBool::new(false)));
        let summary = walker.walk(&sink).unwrap();

        let paths = sink.0.into_inner().unwrap();
        assert_eq!(summary.submitted, 5);
        assert_eq!(paths[0], root);
        assert!(paths.contains(&root.join("sub/deeper")));
        assert!(paths.contains(&root.join("sub/b.txt")));
    }

    #[test]
    fn test_missing_root_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present");
        fs::create_dir(&present).unwrap();
        fs::write(present.join("f"), b"").unwrap();

        let sink = Collect::default();
        let walker = TreeWalker::new(
            vec![dir.path().join("absent"), present.clone()],
            Arc::new(AtomicBool::new(false)),
        );
        let summary = walker.walk(&sink).unwrap();

        assert_eq!(summary.roots_skipped, 1);
        assert_eq!(summary.submitted, 2);
        assert!(sink
            .0
            .into_inner()
            .unwrap()
            .iter()
            .all(|p| p.starts_with(&present)));
    }

    #[test]
    fn test_shutdown_stops_enumeration() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("f"), b"").unwrap();

        let sink = Collect::default();
        let walker = TreeWalker::new(
            vec![dir.path().to_path_buf()],
            Arc::new(AtomicBool::new(true)),
        );
        let summary = walker.walk(&sink).unwrap();

        assert!(summary.interrupted);
        assert_eq!(summary.submitted, 0);
    }
}
