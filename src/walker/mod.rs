//! Tree enumeration and parallel migration
//!
//! # Architecture
//!
//! ```text
//!                     ┌─────────────────────────┐
//!                     │       TreeWalker        │
//!                     │  - root, then walkdir   │
//!                     │  - fire-and-forget      │
//!                     └───────────┬─────────────┘
//!                                 │ bounded queue
//!       ┌─────────────────────────┼─────────────────────────┐
//!       │                         │                         │
//! ┌─────▼─────┐             ┌─────▼─────┐             ┌─────▼─────┐
//! │  Worker 1 │             │  Worker 2 │             │  Worker N │
//! │  inspect  │             │  inspect  │             │  inspect  │
//! │  plan     │             │  plan     │             │  plan     │
//! │  execute  │             │  execute  │             │  execute  │
//! └───────────┘             └───────────┘             └───────────┘
//! ```

pub mod coordinator;
pub mod pool;
pub mod tree;

pub use coordinator::{MigrationCoordinator, MigrationProgress, MigrationResult};
pub use pool::{aggregate_stats, PoolStats, UnitSink, WorkerPool, WorkerStats};
pub use tree::{TreeWalker, WalkSummary};
