//! Per-path migration
//!
//! One unit of work is one path. Each unit is independent:
//!
//! ```text
//!  inspect ──► plan ──► execute
//!  (ls -aled)  (pure)   (chown / chmod, immutable-flag retry)
//! ```
//!
//! Units share only the read-only [`IdentityMap`] and the tool handle.

pub mod executor;
pub mod inspect;
pub mod plan;
pub mod types;

pub use executor::{ExecutionOutcome, LockAwareExecutor, OperationResult, PathExecution};
pub use inspect::{inspect_path, parse_ace, parse_listing};
pub use plan::{
    AceOperation, MigrationPlan, MigrationPlanner, Operation, OwnershipChange,
    UnresolvedAcePolicy,
};
pub use types::{Ace, NamedPrincipal, PathSnapshot, Principal, PrincipalKind};

use crate::directory::IdentityMap;
use crate::error::UnitOutcome;
use crate::tools::PathTools;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Switches that change how units run
#[derive(Debug, Clone, Copy, Default)]
pub struct MigrationOptions {
    /// Log mutations instead of running them
    pub dry_run: bool,

    /// Handling of ACEs whose name has no merged identity
    pub unresolved_aces: UnresolvedAcePolicy,
}

/// Everything a worker needs to migrate a path
#[derive(Clone)]
pub struct MigrationContext {
    pub identities: Arc<IdentityMap>,
    pub tools: Arc<dyn PathTools>,
    pub options: MigrationOptions,
}

impl MigrationContext {
    pub fn new(
        identities: Arc<IdentityMap>,
        tools: Arc<dyn PathTools>,
        options: MigrationOptions,
    ) -> Self {
        Self {
            identities,
            tools,
            options,
        }
    }
}

/// Inspect, plan and execute one path
///
/// Never panics on bad input and never returns an error: whatever goes
/// wrong is reported in the outcome.
pub fn migrate_path(ctx: &MigrationContext, path: &Path) -> UnitOutcome {
    let snapshot = match inspect_path(ctx.tools.as_ref(), path) {
        Ok(snapshot) => snapshot,
        Err(error) => {
            if error.is_vanished() {
                debug!(path = %path.display(), "Path vanished before inspection");
            } else {
                warn!(path = %path.display(), error = %error, "Inspection failed");
            }
            return UnitOutcome::Failed {
                path: path.to_path_buf(),
                error,
            };
        }
    };

    let plan = MigrationPlanner::new(&ctx.identities, ctx.options.unresolved_aces).plan(&snapshot);
    if plan.is_empty() {
        return UnitOutcome::Migrated {
            path: path.to_path_buf(),
            applied: 0,
            unlocked: false,
            failed: 0,
        };
    }

    let execution = LockAwareExecutor::new(ctx.tools.as_ref(), ctx.options.dry_run).execute(&plan);

    if execution.failed() > 0 {
        warn!(
            path = %path.display(),
            applied = execution.applied(),
            failed = execution.failed(),
            "Path partially migrated"
        );
    } else {
        info!(
            path = %path.display(),
            applied = execution.applied(),
            unlocked = execution.unlocked(),
            "Path migrated"
        );
    }
    if execution.relocked == Some(false) {
        warn!(path = %path.display(), "Path left without its immutable flag");
    }

    UnitOutcome::Migrated {
        path: path.to_path_buf(),
        applied: execution.applied(),
        unlocked: execution.unlocked(),
        failed: execution.failed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{MergedIdentity, MergedIdentityTable, RecordCategory};
    use crate::error::{ToolError, ToolResult};
    use crate::tools::ToolCommand;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Listings by path; every mutation succeeds and is recorded
    #[derive(Default)]
    struct FakeTools {
        listings: HashMap<String, String>,
        commands: Mutex<Vec<String>>,
    }

    impl PathTools for FakeTools {
        fn list(&self, path: &Path) -> ToolResult<String> {
            self.listings
                .get(path.to_str().unwrap_or_default())
                .cloned()
                .ok_or_else(|| ToolError::Failed {
                    program: "ls".into(),
                    status: "1".into(),
                    stderr: format!("ls: {}: No such file or directory", path.display()),
                })
        }

        fn run(&self, command: &ToolCommand, path: &Path) -> ToolResult<()> {
            self.commands
                .lock()
                .unwrap()
                .push(command.display_with(path).to_string());
            Ok(())
        }

        fn set_immutable(&self, _path: &Path, _immutable: bool) -> ToolResult<()> {
            Ok(())
        }
    }

    fn context(tools: Arc<FakeTools>, dry_run: bool) -> MigrationContext {
        let mut users = MergedIdentityTable::new(RecordCategory::Users);
        users.insert(
            "alice".into(),
            MergedIdentity {
                source_id: 1001,
                target_id: 5001,
            },
        );
        let groups = MergedIdentityTable::new(RecordCategory::Groups);
        MigrationContext::new(
            Arc::new(IdentityMap::new(users, groups)),
            tools,
            MigrationOptions {
                dry_run,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_migrate_path() {
        let mut tools = FakeTools::default();
        tools.listings.insert(
            "/Shares/a".into(),
            "-rw-r--r--+ 1 alice wheel 0 Jun 30 10:00 /Shares/a\n 0: user:alice allow read\n"
                .into(),
        );
        let tools = Arc::new(tools);
        let outcome = migrate_path(&context(tools.clone(), false), Path::new("/Shares/a"));

        assert!(outcome.is_success());
        assert!(matches!(outcome, UnitOutcome::Migrated { applied: 2, .. }));
        assert_eq!(
            *tools.commands.lock().unwrap(),
            vec![
                "chown 5001 \"/Shares/a\"".to_string(),
                "chmod =a# 0 \"user:alice allow read\" \"/Shares/a\"".to_string(),
            ]
        );
    }

    #[test]
    fn test_nothing_to_do() {
        let mut tools = FakeTools::default();
        tools.listings.insert(
            "/Shares/b".into(),
            "-rw-r--r-- 1 root wheel 0 Jun 30 10:00 /Shares/b\n".into(),
        );
        let tools = Arc::new(tools);
        let outcome = migrate_path(&context(tools.clone(), false), Path::new("/Shares/b"));

        assert!(matches!(outcome, UnitOutcome::Migrated { applied: 0, .. }));
        assert!(tools.commands.lock().unwrap().is_empty());
    }

    #[test]
    fn test_vanished_path_is_failed_unit() {
        let tools = Arc::new(FakeTools::default());
        let outcome = migrate_path(&context(tools, false), Path::new("/Shares/gone"));

        match outcome {
            UnitOutcome::Failed { error, .. } => assert!(error.is_vanished()),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_dry_run_runs_nothing() {
        let mut tools = FakeTools::default();
        tools.listings.insert(
            "/Shares/a".into(),
            "-rw-r--r-- 1 alice wheel 0 Jun 30 10:00 /Shares/a\n".into(),
        );
        let tools = Arc::new(tools);
        let outcome = migrate_path(&context(tools.clone(), true), Path::new("/Shares/a"));

        assert!(matches!(outcome, UnitOutcome::Migrated { applied: 1, .. }));
        assert!(tools.commands.lock().unwrap().is_empty());
    }
}
