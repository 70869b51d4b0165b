//! Version Node Module
//!
//! One physical row version plus its chain links and consensus baton.
//!
//! ## Responsibilities
//! - Hold the links of a circular doubly-linked version chain
//! - Carry the creating transaction id and the payload locator
//! - Carry the baton used by the append/cut consensus protocol
//! - Record the logical time at which the node was spliced out
//!
//! ## Layout
//! Every field is an atomic so that nodes can be shared between threads
//! without any lock. Links are `NodeHandle` slot indices into the arena,
//! never native pointers:
//!
//! ```text
//!            ┌──────────────────────── next ───────────────────────┐
//!            ▼                                                     │
//!      ┌──────────┐  next  ┌────────┐  next  ┌────────┐  next  ┌──────────┐
//!      │ sentinel │ ─────► │ oldest │ ─────► │  ...   │ ─────► │  newest  │
//!      └──────────┘ ◄───── └────────┘ ◄───── └────────┘ ◄───── └──────────┘
//!            │       prev              prev              prev       ▲
//!            └──────────────────────── prev ───────────────────────┘
//! ```

mod baton;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

pub use baton::{Baton, BatonState};

use crate::epoch::Epoch;
use crate::mvcc::TxnId;

/// Location of a node in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(u32);

impl NodeHandle {
    /// Wrap a raw slot index
    pub const fn new(slot: u32) -> Self {
        Self(slot)
    }

    /// The raw slot index
    pub const fn slot(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque pointer to the tuple payload, owned by the heap layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TupleLocator(pub u64);

/// One physical version in a chain (or a chain's sentinel)
pub struct VersionNode {
    /// This node's own slot; fixed for the life of the arena
    handle: NodeHandle,

    /// Next older version; for the sentinel, the newest version
    prev: AtomicU32,

    /// Next newer version; for the sentinel, the oldest version
    next: AtomicU32,

    /// Transaction that produced this version
    creator: AtomicU64,

    /// Where the payload lives
    locator: AtomicU64,

    baton: Baton,

    /// Logical removal time, 0 while linked
    deleted_at: AtomicU64,

    sentinel: AtomicBool,

    /// Set while the arena has the slot handed out
    allocated: AtomicBool,
}

impl VersionNode {
    /// Create an unlinked node for `handle` (links point at itself)
    pub(crate) fn vacant(handle: NodeHandle) -> Self {
        Self {
            handle,
            prev: AtomicU32::new(handle.slot()),
            next: AtomicU32::new(handle.slot()),
            creator: AtomicU64::new(0),
            locator: AtomicU64::new(0),
            baton: Baton::new(),
            deleted_at: AtomicU64::new(0),
            sentinel: AtomicBool::new(false),
            allocated: AtomicBool::new(false),
        }
    }

    /// Re-initialise a slot handed out by the arena
    ///
    /// Only valid while no other thread can reach the slot.
    pub(crate) fn reset(&self, creator: TxnId, locator: TupleLocator, sentinel: bool) {
        self.prev.store(self.handle.slot(), Ordering::Relaxed);
        self.next.store(self.handle.slot(), Ordering::Relaxed);
        self.creator.store(creator.0, Ordering::Relaxed);
        self.locator.store(locator.0, Ordering::Relaxed);
        self.baton.reset();
        self.deleted_at.store(0, Ordering::Relaxed);
        self.sentinel.store(sentinel, Ordering::SeqCst);
        self.allocated.store(true, Ordering::SeqCst);
    }

    /// Hand the slot back to the arena
    ///
    /// Returns false if the slot was not handed out, i.e. it is being freed
    /// a second time.
    pub(crate) fn free(&self) -> bool {
        self.allocated.swap(false, Ordering::SeqCst)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn handle(&self) -> NodeHandle {
        self.handle
    }

    pub fn prev(&self) -> NodeHandle {
        NodeHandle(self.prev.load(Ordering::SeqCst))
    }

    pub fn next(&self) -> NodeHandle {
        NodeHandle(self.next.load(Ordering::SeqCst))
    }

    pub fn creator(&self) -> TxnId {
        TxnId(self.creator.load(Ordering::Acquire))
    }

    pub fn locator(&self) -> TupleLocator {
        TupleLocator(self.locator.load(Ordering::Acquire))
    }

    pub fn baton(&self) -> &Baton {
        &self.baton
    }

    /// Logical time the node was spliced out, if it has been
    pub fn deleted_at(&self) -> Option<Epoch> {
        match self.deleted_at.load(Ordering::SeqCst) {
            0 => None,
            at => Some(at),
        }
    }

    pub fn is_removed(&self) -> bool {
        self.deleted_at().is_some()
    }

    pub fn is_sentinel(&self) -> bool {
        self.sentinel.load(Ordering::SeqCst)
    }

    /// True between allocation and release/reclaim
    pub fn is_allocated(&self) -> bool {
        self.allocated.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Mutators (chain protocol only)
    // =========================================================================

    pub(crate) fn set_prev(&self, handle: NodeHandle) {
        self.prev.store(handle.slot(), Ordering::SeqCst);
    }

    pub(crate) fn set_next(&self, handle: NodeHandle) {
        self.next.store(handle.slot(), Ordering::SeqCst);
    }

    pub(crate) fn mark_deleted(&self, at: Epoch) {
        debug_assert!(at != 0, "epoch 0 is reserved for live nodes");
        self.deleted_at.store(at, Ordering::SeqCst);
    }
}

impl fmt::Debug for VersionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionNode")
            .field("handle", &self.handle)
            .field("prev", &self.prev())
            .field("next", &self.next())
            .field("creator", &self.creator())
            .field("baton", &self.baton.load())
            .field("deleted_at", &self.deleted_at())
            .field("sentinel", &self.is_sentinel())
            .field("allocated", &self.is_allocated())
            .finish()
    }
}
