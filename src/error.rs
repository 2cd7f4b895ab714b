//! Error types for ds-migrate
//!
//! This module defines the error hierarchy for a migration run:
//! - Configuration and provider discovery errors
//! - Identity query errors (always fatal)
//! - External tool errors
//! - Path inspection errors (local to one path)
//! - Worker pool errors
//!
//! Fatal errors abort the run before any filesystem mutation. Per-path
//! errors are captured in a [`UnitOutcome`] and never unwind past the
//! worker that produced them.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for a migration run
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Identity provider errors
    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}

/// Configuration and provider discovery errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Log file cannot be created where requested
    #[error("Invalid log file path '{path}': {reason}")]
    InvalidLogPath { path: PathBuf, reason: String },

    /// No CSPSearchPath block in the search policy
    #[error("Search policy has no CSPSearchPath entry")]
    SearchPathMissing,

    /// Search path does not list local, target, and source nodes
    #[error("Unexpected search path {nodes:?}: expected exactly {expected} nodes")]
    SearchPathLength { nodes: Vec<String>, expected: usize },

    /// Node string is neither LDAPv3 nor Active Directory
    #[error("Unsupported directory node '{node}'")]
    UnsupportedNode { node: String },

    /// Search policy could not be read
    #[error("Failed to read search policy: {0}")]
    SearchPolicy(#[from] ToolError),
}

/// Identity provider errors. All of these abort the run.
#[derive(Error, Debug)]
pub enum DirectoryError {
    /// The identity query could not be executed
    #[error("Failed to query {record_path} on '{node}': {source}")]
    QueryFailed {
        node: String,
        record_path: &'static str,
        source: ToolError,
    },

    /// Output did not contain a single well-formed record
    #[error("Could not parse {record_path} records from '{node}'")]
    Unparseable {
        node: String,
        record_path: &'static str,
    },

    /// Zero records survived filtering
    #[error("No {record_path} records found on '{node}'")]
    NoRecords {
        node: String,
        record_path: &'static str,
    },
}

/// External tool errors
#[derive(Error, Debug, Clone)]
pub enum ToolError {
    /// The program could not be started
    #[error("Failed to run '{program}': {reason}")]
    Spawn { program: String, reason: String },

    /// The program ran but reported failure
    #[error("'{program}' exited with status {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
}

/// Path inspection errors. These fail one path, never the run.
#[derive(Error, Debug, Clone)]
pub enum InspectError {
    /// The listing tool failed
    #[error("Failed to list '{path}': {source}")]
    Listing { path: PathBuf, source: ToolError },

    /// The listing tool returned nothing
    #[error("Empty listing for '{path}'")]
    EmptyListing { path: PathBuf },

    /// The first line has no owner and group fields
    #[error("Cannot read owner and group for '{path}' from '{line}'")]
    MalformedOwnerLine { path: PathBuf, line: String },

    /// A line after the first is not an ACE
    #[error("Unrecognized ACL entry for '{path}': '{line}'")]
    MalformedAce { path: PathBuf, line: String },
}

impl InspectError {
    /// Check if the path vanished between enumeration and inspection
    pub fn is_vanished(&self) -> bool {
        match self {
            InspectError::Listing {
                source: ToolError::Failed { stderr, .. },
                ..
            } => stderr.contains("No such file"),
            _ => false,
        }
    }
}

/// Worker pool errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker panicked
    #[error("Worker {id} panicked: {message}")]
    Panicked { id: usize, message: String },

    /// Worker thread could not be spawned
    #[error("Failed to initialize worker {id}: {reason}")]
    InitFailed { id: usize, reason: String },

    /// The unit queue closed while submitting
    #[error("Failed to submit unit: queue closed")]
    QueueClosed,
}

/// Result type alias for MigrateError
pub type Result<T> = std::result::Result<T, MigrateError>;

/// Result type alias for ToolError
pub type ToolResult<T> = std::result::Result<T, ToolError>;

/// Represents the outcome of migrating a single path
#[derive(Debug)]
pub enum UnitOutcome {
    /// Every planned operation ran (some may still have failed)
    Migrated {
        path: PathBuf,
        applied: usize,
        unlocked: bool,
        failed: usize,
    },

    /// The path could not be inspected
    Failed { path: PathBuf, error: InspectError },
}

impl UnitOutcome {
    /// Returns true if every planned operation succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, UnitOutcome::Migrated { failed: 0, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vanished_path_detection() {
        let gone = InspectError::Listing {
            path: "/data/gone".into(),
            source: ToolError::Failed {
                program: "ls".into(),
                status: "1".into(),
                stderr: "ls: /data/gone: No such file or directory".into(),
            },
        };
        assert!(gone.is_vanished());

        let malformed = InspectError::MalformedAce {
            path: "/data/x".into(),
            line: "garbage".into(),
        };
        assert!(!malformed.is_vanished());
    }

    #[test]
    fn test_error_conversion() {
        let err = ConfigError::SearchPathMissing;
        let top: MigrateError = err.into();
        assert!(matches!(top, MigrateError::Config(_)));

        let dir = DirectoryError::NoRecords {
            node: "/LDAPv3/od.example.com".into(),
            record_path: "/Users",
        };
        let top: MigrateError = dir.into();
        assert!(top.to_string().contains("No /Users records"));
    }

    #[test]
    fn test_unit_outcome_success() {
        let ok = UnitOutcome::Migrated {
            path: "/a".into(),
            applied: 3,
            unlocked: false,
            failed: 0,
        };
        assert!(ok.is_success());

        let partial = UnitOutcome::Migrated {
            path: "/b".into(),
            applied: 2,
            unlocked: true,
            failed: 1,
        };
        assert!(!partial.is_success());
    }
}
