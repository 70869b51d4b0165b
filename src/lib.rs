//! # vchain
//!
//! Per-row multi-version storage substrate for a database engine:
//! - One circular version chain per primary key, newest version at the tail
//! - Snapshot lookups with epoch-protected, lock-free traversal
//! - Lock-free append that races safely with concurrent removal
//! - Append/cut consensus through a per-node tri-state baton
//! - Epoch-based reclamation of spliced-out versions
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      VersionChains                           │
//! │            lookup / append / cut / reclaim                   │
//! └──────┬──────────────────┬──────────────────────┬────────────┘
//!        │                  │                      │
//!        ▼                  ▼                      ▼
//! ┌─────────────┐   ┌───────────────┐      ┌───────────────┐
//! │ ChainIndex  │   │ EpochRegistry │      │  Visibility   │
//! │ (RwLock per │   │ (pinned reader│      │  Predicate    │
//! │  partition) │   │    epochs)    │      │               │
//! └──────┬──────┘   └───────┬───────┘      └───────────────┘
//!        │ sentinel          │ oldest epoch
//!        ▼                   ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        NodeArena                             │
//! │     VersionNode slots addressed by NodeHandle                │
//! └─────────────────────────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod node;
pub mod store;
pub mod epoch;
pub mod index;
pub mod mvcc;
pub mod chain;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ChainError, Result};
pub use config::{BackoffStrategy, Config};
pub use chain::{
    shmem_size, ChainObserver, ChainStats, CutOutcome, FixUpPerformer, VersionChains,
    VisibleVersion,
};
pub use index::PrimaryKey;
pub use mvcc::{Snapshot, SnapshotVisibility, TxnId, VisibilityPredicate};
pub use node::{BatonState, NodeHandle, TupleLocator};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of vchain
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
