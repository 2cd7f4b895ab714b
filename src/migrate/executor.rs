//! Plan execution with immutable-flag handling
//!
//! Each operation is attempted once. When it fails, the path's immutable
//! flag is cleared and the operation retried exactly once. If any retry
//! succeeded the flag is restored once, after the whole plan has run.
//!
//! ```text
//!   run ──ok──────────────────────────────► Applied
//!    │
//!   fail ─► clear flag ─fail─► Failed, abort rest of path
//!               │
//!              ok ─► run ──ok──► AppliedAfterUnlock ─┐
//!                     │                              ├─► set flag once at end
//!                    fail ─► Failed                  │
//! ```
//!
//! Dry-run never touches the filesystem: every operation is logged and
//! reported as applied.

use super::plan::{MigrationPlan, Operation};
use crate::tools::PathTools;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Result of one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Succeeded on the first attempt
    Applied,

    /// Succeeded after clearing the immutable flag
    AppliedAfterUnlock,

    /// Did not succeed
    Failed,
}

/// An operation and how it went
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    pub operation: Operation,
    pub outcome: ExecutionOutcome,
}

/// Everything that happened to one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExecution {
    pub path: PathBuf,

    /// Results in plan order
    pub results: Vec<OperationResult>,

    /// Operations never attempted because the flag could not be cleared
    pub aborted: usize,

    /// `Some(ok)` when the immutable flag had to be restored
    pub relocked: Option<bool>,
}

impl PathExecution {
    fn count(&self, outcome: ExecutionOutcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }

    /// Operations that took effect
    pub fn applied(&self) -> usize {
        self.count(ExecutionOutcome::Applied) + self.count(ExecutionOutcome::AppliedAfterUnlock)
    }

    /// Operations that failed or were never attempted
    pub fn failed(&self) -> usize {
        self.count(ExecutionOutcome::Failed) + self.aborted
    }

    /// Any operation needed the flag cleared
    pub fn unlocked(&self) -> bool {
        self.count(ExecutionOutcome::AppliedAfterUnlock) > 0
    }
}

/// Applies plans, retrying through the immutable flag
pub struct LockAwareExecutor<'a, T: PathTools + ?Sized> {
    tools: &'a T,
    dry_run: bool,
}

impl<'a, T: PathTools + ?Sized> LockAwareExecutor<'a, T> {
    pub fn new(tools: &'a T, dry_run: bool) -> Self {
        Self { tools, dry_run }
    }

    /// Run every operation of `plan` in order
    pub fn execute(&self, plan: &MigrationPlan) -> PathExecution {
        let mut execution = PathExecution {
            path: plan.path.clone(),
            results: Vec::with_capacity(plan.len()),
            aborted: 0,
            relocked: None,
        };
        let mut flag_cleared = false;

        for (index, operation) in plan.operations.iter().enumerate() {
            match self.apply(&execution.path, operation, &mut flag_cleared) {
                Some(outcome) => execution.results.push(OperationResult {
                    operation: operation.clone(),
                    outcome,
                }),
                None => {
                    execution.results.push(OperationResult {
                        operation: operation.clone(),
                        outcome: ExecutionOutcome::Failed,
                    });
                    execution.aborted = plan.len() - index - 1;
                    break;
                }
            }
        }

        if execution.unlocked() {
            execution.relocked = Some(self.relock(&execution.path));
        }

        execution
    }

    /// Apply one operation; `None` means the flag could not be cleared
    fn apply(
        &self,
        path: &Path,
        operation: &Operation,
        flag_cleared: &mut bool,
    ) -> Option<ExecutionOutcome> {
        let command = operation.to_command();

        if self.dry_run {
            info!(step = %operation, "Would run: {}", command.display_with(path));
            return Some(ExecutionOutcome::Applied);
        }

        debug!(step = %operation, "Running: {}", command.display_with(path));
        let first = match self.tools.run(&command, path) {
            Ok(()) => return Some(ExecutionOutcome::Applied),
            Err(e) => e,
        };

        info!(
            path = %path.display(),
            error = %first,
            "Command failed, clearing immutable flag and retrying"
        );

        if !*flag_cleared {
            if let Err(e) = self.tools.set_immutable(path, false) {
                error!(path = %path.display(), error = %e, "Failed to clear immutable flag");
                return None;
            }
            *flag_cleared = true;
        }

        match self.tools.run(&command, path) {
            Ok(()) => Some(ExecutionOutcome::AppliedAfterUnlock),
            Err(e) => {
                error!(
                    path = %path.display(),
                    error = %e,
                    "Command failed after unlock: {}",
                    command.display_with(path)
                );
                Some(ExecutionOutcome::Failed)
            }
        }
    }

    fn relock(&self, path: &Path) -> bool {
        match self.tools.set_immutable(path, true) {
            Ok(()) => {
                debug!(path = %path.display(), "Immutable flag restored");
                true
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to restore immutable flag");
                false
            }
        }
    }
}
