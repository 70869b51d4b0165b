//! Node arena implementation
//!
//! A boxed slice of nodes allocated once at init. Fresh slots come from a
//! bump counter; reclaimed slots are recycled through a free list.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::epoch::Epoch;
use crate::error::{ChainError, Result};
use crate::mvcc::TxnId;
use crate::node::{NodeHandle, TupleLocator, VersionNode};

/// Owner of every node slot
///
/// ## Concurrency:
/// - `resolve`: lock-free, slots never move
/// - `next_unused`: atomic bump counter
/// - `free` / `retired`: short parking_lot mutexes, never held across the
///   chain protocol
pub struct NodeArena {
    /// Every node slot, indexed by `NodeHandle`
    slots: Box<[VersionNode]>,

    /// First slot never handed out
    next_unused: AtomicUsize,

    /// Reclaimed slots ready for reuse
    free: Mutex<Vec<NodeHandle>>,

    /// Spliced-out nodes waiting for readers to move past them
    retired: Mutex<Vec<NodeHandle>>,

    /// Slots currently handed out (linked, unlinked, or retired)
    live: AtomicUsize,
}

impl NodeArena {
    /// Create an arena with `capacity` slots
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|slot| VersionNode::vacant(NodeHandle::new(slot as u32)))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            slots,
            next_unused: AtomicUsize::new(0),
            free: Mutex::new(Vec::new()),
            retired: Mutex::new(Vec::new()),
            live: AtomicUsize::new(0),
        }
    }

    /// Bytes needed for an arena of `capacity` slots
    pub fn shmem_size(capacity: usize) -> usize {
        std::mem::size_of::<VersionNode>() * capacity
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    /// Allocate an unlinked version node
    pub fn allocate(&self, creator: TxnId, locator: TupleLocator) -> Result<NodeHandle> {
        self.allocate_slot(creator, locator, false)
    }

    /// Allocate a chain sentinel (an empty circular list of itself)
    pub fn allocate_sentinel(&self) -> Result<NodeHandle> {
        self.allocate_slot(TxnId::default(), TupleLocator::default(), true)
    }

    /// Give back a node that was allocated but never linked into a chain
    ///
    /// # Panics
    /// If `handle` is a sentinel, is still linked, or is not handed out.
    pub fn release(&self, handle: NodeHandle) {
        let node = self.resolve(handle);
        assert!(!node.is_sentinel(), "cannot release sentinel {handle}");
        assert!(
            node.prev() == handle && node.next() == handle,
            "released node {handle} is still linked"
        );
        assert!(node.free(), "node {handle} released twice");
        self.free.lock().push(handle);
        self.live.fetch_sub(1, Ordering::SeqCst);
    }

    fn allocate_slot(
        &self,
        creator: TxnId,
        locator: TupleLocator,
        sentinel: bool,
    ) -> Result<NodeHandle> {
        // Step 1: Prefer a recycled slot, then a fresh one
        let recycled = self.free.lock().pop();
        let handle = match recycled {
            Some(handle) => handle,
            None => {
                let capacity = self.slots.len();
                let slot = self
                    .next_unused
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                        (n < capacity).then_some(n + 1)
                    })
                    .map_err(|_| ChainError::ArenaExhausted { capacity })?;
                NodeHandle::new(slot as u32)
            }
        };

        // Step 2: Nobody else can see the slot yet, so plain re-init is fine
        self.slots[handle.index()].reset(creator, locator, sentinel);
        self.live.fetch_add(1, Ordering::SeqCst);

        Ok(handle)
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Resolve a handle to its node
    ///
    /// # Panics
    /// An out-of-range handle can only come from a corrupted link.
    pub fn resolve(&self, handle: NodeHandle) -> &VersionNode {
        match self.slots.get(handle.index()) {
            Some(node) => node,
            None => panic!(
                "corrupted link: handle {handle} outside arena of {} slots",
                self.slots.len()
            ),
        }
    }

    // =========================================================================
    // Reclamation
    // =========================================================================

    /// Queue a spliced-out node for reclamation
    pub fn retire(&self, handle: NodeHandle) {
        let node = self.resolve(handle);
        assert!(
            node.is_removed(),
            "retired node {handle} has not been spliced out"
        );
        self.retired.lock().push(handle);
    }

    /// Recycle every retired node removed before `oldest`
    ///
    /// `oldest` is the oldest published reader epoch; `None` means no reader
    /// is pinned and everything retired can go. Returns the number of slots
    /// moved to the free list.
    pub fn reclaim(&self, oldest: Option<Epoch>) -> usize {
        let mut retired = self.retired.lock();
        let mut freed = Vec::new();

        retired.retain(|&handle| {
            let removed_at = self.slots[handle.index()].deleted_at();
            let reclaimable = match (removed_at, oldest) {
                (Some(_), None) => true,
                (Some(at), Some(oldest)) => at < oldest,
                (None, _) => false,
            };
            if reclaimable {
                assert!(
                    self.slots[handle.index()].free(),
                    "node {handle} retired twice"
                );
                freed.push(handle);
            }
            !reclaimable
        });
        drop(retired);

        let count = freed.len();
        if count > 0 {
            self.free.lock().extend(freed);
            self.live.fetch_sub(count, Ordering::SeqCst);
        }
        count
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Total number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slots currently handed out
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Nodes waiting for reclamation
    pub fn retired(&self) -> usize {
        self.retired.lock().len()
    }
}

impl std::fmt::Debug for NodeArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeArena")
            .field("capacity", &self.capacity())
            .field("live", &self.live())
            .field("retired", &self.retired())
            .finish()
    }
}
