//! ds-migrate - POSIX ownership and ACL migration between directory services
//!
//! After users and groups move from one directory service to another (for
//! example from Open Directory to Active Directory), every file still
//! carries the old numeric owner, group and ACL principals. This crate
//! re-maps them to the target service's ids, path by path.
//!
//! # Features
//!
//! - **Name-keyed identity merge**: users and groups are joined by name
//!   across the source and target providers, once, before any file work.
//!
//! - **Ordinal-aware ACL rewriting**: orphaned entries are deleted and
//!   every later entry is addressed by its corrected position.
//!
//! - **Immutable-flag handling**: a failing mutation clears the path's
//!   immutable flag, retries once, and the flag is restored afterwards.
//!
//! - **Parallel or sequential**: a bounded worker pool, or strictly inline.
//!
//! - **Dry-run**: every command is logged instead of run.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Directory service (dscl)                        │
//! │        search policy  ·  source node  ·  target node             │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │ discover, resolve, merge
//!                               ▼
//!                  ┌──────────────────────────┐
//!                  │  IdentityMap (read-only) │
//!                  │   users   ·   groups     │
//!                  └────────────┬─────────────┘
//!                               │ Arc, shared by every worker
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  TreeWalker ──► bounded queue ──► Worker 1 … Worker N           │
//! │                                   inspect → plan → execute       │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │ chown · chmod · chflags
//!                               ▼
//!                          filesystem
//! ```
//!
//! # Example
//!
//! ```bash
//! # See what would change
//! ds-migrate /Volumes/Shares --dry-run
//!
//! # Migrate with 16 workers, no prompt
//! ds-migrate /Volumes/Shares --pool -w 16 --yes
//! ```

pub mod config;
pub mod directory;
pub mod error;
pub mod migrate;
pub mod progress;
pub mod tools;
pub mod walker;

pub use config::{CliArgs, MigrateConfig};
pub use directory::{build_identity_map, discover_providers, IdentityMap, IdentityResolution};
pub use error::{MigrateError, Result, UnitOutcome};
pub use migrate::{migrate_path, MigrationContext, MigrationOptions};
pub use tools::{DirectoryService, PathTools, SystemTools};
pub use walker::{MigrationCoordinator, MigrationResult};
