//! Version Chains Module
//!
//! The lock-free version-chain protocol and the facade that owns the arena,
//! index, and epoch registry it runs on.
//!
//! ## Responsibilities
//! - Snapshot-visible lookup with epoch-protected traversal (`lookup`)
//! - Lock-free tail append racing safely with removal (`append`)
//! - Remover side of the append/cut consensus (`cut`)
//! - The splice that logically deletes a node (`fix_up`)
//! - Handing removed nodes to reclamation (`retire` / `reclaim`)
//!
//! ## Consensus Protocol
//! An appender and a cutter that target the same node meet on its baton:
//!
//! ```text
//!   appender                         cutter
//!   ────────                         ──────
//!   claim  Idle → AppendClaimed      swap → DeleteClaimed
//!     │ lost (DeleteClaimed):          │ got Idle:          splice it myself
//!     │   wait for the tail to move    │ got AppendClaimed: appender splices
//!     ▼
//!   link new version
//!   swap → Idle
//!     │ got DeleteClaimed: splice on the cutter's behalf
//! ```
//!
//! Exactly one side observes the other's claim, so exactly one side splices.

mod append;
mod cutter;
mod fixup;
mod lookup;
mod stats;

use std::sync::Arc;

pub use cutter::CutOutcome;
pub use stats::ChainStats;

use crate::config::Config;
use crate::epoch::EpochRegistry;
use crate::error::{ChainError, Result};
use crate::index::{ChainIndex, PrimaryKey};
use crate::mvcc::{SnapshotVisibility, TxnId, VisibilityPredicate};
use crate::node::{NodeHandle, TupleLocator, VersionNode};
use crate::store::NodeArena;

use stats::ChainCounters;

/// Which side of the consensus protocol performed a splice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixUpPerformer {
    /// An appender that found the cutter's claim when releasing the tail
    Appender,

    /// The cutter, after winning the baton outright
    Cutter,
}

/// Hook notified of every splice, for diagnostics and tests
pub trait ChainObserver: Send + Sync {
    fn fixed_up(&self, node: NodeHandle, performer: FixUpPerformer);
}

/// A version as seen by a reader
///
/// Copied out of the node while the reader's epoch was published, so it
/// stays valid after the node is reclaimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleVersion {
    pub handle: NodeHandle,
    pub creator: TxnId,
    pub locator: TupleLocator,
}

impl From<&VersionNode> for VisibleVersion {
    fn from(node: &VersionNode) -> Self {
        Self {
            handle: node.handle(),
            creator: node.creator(),
            locator: node.locator(),
        }
    }
}

/// Bytes of shared state a `VersionChains` built from `config` needs
pub fn shmem_size(config: &Config) -> usize {
    ChainIndex::shmem_size(
        config.expected_chains + config.index_partitions,
        config.index_partitions,
    ) + NodeArena::shmem_size(config.arena_capacity)
        + EpochRegistry::shmem_size(config.max_readers)
}

/// Per-row version chains
///
/// ## Concurrency:
/// - Every method takes `&self`; share the instance through an `Arc`
/// - Nodes are mutated only through atomics; no lock is held across a
///   chain traversal or mutation
/// - Index partition locks cover only the sentinel lookup/insert
/// - One cutter at a time per chain
pub struct VersionChains<P = SnapshotVisibility> {
    config: Config,

    /// Owner of every node and sentinel
    arena: NodeArena,

    /// Primary key → sentinel
    index: ChainIndex,

    /// Reader epochs and the logical clock used for removal stamps
    epochs: EpochRegistry,

    predicate: P,

    observer: Option<Arc<dyn ChainObserver>>,

    counters: ChainCounters,
}

impl VersionChains<SnapshotVisibility> {
    /// One-time initialisation with the default visibility rule
    pub fn init(config: Config) -> Result<Self> {
        Self::with_predicate(config, SnapshotVisibility)
    }
}

impl<P: VisibilityPredicate> VersionChains<P> {
    /// One-time initialisation with a custom visibility predicate
    pub fn with_predicate(config: Config, predicate: P) -> Result<Self> {
        config.validate()?;

        let arena = NodeArena::new(config.arena_capacity);
        let index = ChainIndex::new(
            config.expected_chains + config.index_partitions,
            config.index_partitions,
        );
        let epochs = EpochRegistry::new(config.max_readers);

        tracing::info!(
            arena_capacity = config.arena_capacity,
            expected_chains = config.expected_chains,
            partitions = config.index_partitions,
            max_readers = config.max_readers,
            bytes = shmem_size(&config),
            "version chains initialised"
        );

        Ok(Self {
            config,
            arena,
            index,
            epochs,
            predicate,
            observer: None,
            counters: ChainCounters::default(),
        })
    }

    /// Attach a splice observer
    pub fn with_observer(mut self, observer: Arc<dyn ChainObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    // =========================================================================
    // Node Allocation
    // =========================================================================

    /// Allocate an unlinked version node for a later `append`
    pub fn allocate(&self, creator: TxnId, locator: TupleLocator) -> Result<NodeHandle> {
        self.arena.allocate(creator, locator)
    }

    /// Return a node that was allocated but never appended
    pub fn release(&self, handle: NodeHandle) {
        self.arena.release(handle);
    }

    /// Resolve a handle
    pub fn node(&self, handle: NodeHandle) -> &VersionNode {
        self.arena.resolve(handle)
    }

    /// Sentinel of `key`'s chain, if the chain exists
    pub fn sentinel(&self, key: PrimaryKey) -> Option<NodeHandle> {
        self.index.lookup(&key, key.hash_code())
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Every version of `key`, newest first
    ///
    /// Taken under an epoch guard; under concurrent writers it may include
    /// nodes that are being spliced out or miss ones being linked.
    pub fn versions(&self, key: PrimaryKey) -> Vec<VisibleVersion> {
        let Some(sentinel) = self.sentinel(key) else {
            return Vec::new();
        };

        let _guard = self.epochs.pin();
        let mut versions = Vec::new();
        let mut cursor = self.arena.resolve(sentinel).prev();
        while cursor != sentinel {
            let node = self.arena.resolve(cursor);
            versions.push(VisibleVersion::from(node));
            cursor = node.prev();
        }
        versions
    }

    /// Walk `key`'s chain checking `a.next.prev == a` at every hop
    ///
    /// Returns the number of versions. Only meaningful while no append or
    /// cut is in flight on the chain; a missing chain counts as empty.
    pub fn verify_chain(&self, key: PrimaryKey) -> Result<usize> {
        let Some(sentinel) = self.sentinel(key) else {
            return Ok(0);
        };

        let _guard = self.epochs.pin();
        let mut count = 0;
        let mut at = sentinel;
        loop {
            let next = self.arena.resolve(at).next();
            let back = self.arena.resolve(next).prev();
            if back != at {
                return Err(ChainError::BrokenLink {
                    at: next,
                    expected: at,
                    found: back,
                });
            }
            if next == sentinel {
                return Ok(count);
            }

            count += 1;
            if count > self.arena.capacity() {
                // A cycle that never returns to the sentinel
                return Err(ChainError::BrokenLink {
                    at: next,
                    expected: sentinel,
                    found: self.arena.resolve(next).next(),
                });
            }
            at = next;
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    pub fn index(&self) -> &ChainIndex {
        &self.index
    }

    pub fn epochs(&self) -> &EpochRegistry {
        &self.epochs
    }

    /// Snapshot of the protocol counters
    pub fn stats(&self) -> ChainStats {
        self.counters.snapshot()
    }
}

impl<P> std::fmt::Debug for VersionChains<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionChains")
            .field("arena", &self.arena)
            .field("index", &self.index)
            .field("epochs", &self.epochs)
            .field("stats", &self.counters.snapshot())
            .finish()
    }
}
