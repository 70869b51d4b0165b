//! Epoch registry implementation
//!
//! A logical clock plus a fixed table of cache-padded publication slots.
//! Pinning claims an empty slot with a CAS; dropping the guard empties it.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crossbeam::utils::{Backoff, CachePadded};

use super::Epoch;

/// Slot value meaning "nobody is pinned here"
const VACANT: Epoch = 0;

/// Published reader epochs and the logical clock they are drawn from
pub struct EpochRegistry {
    /// Last timestamp handed out
    clock: CachePadded<AtomicU64>,

    /// One slot per concurrently pinned guard
    slots: Box<[CachePadded<AtomicU64>]>,

    /// Rotating start point for slot scans
    cursor: AtomicUsize,
}

impl EpochRegistry {
    /// Create a registry with room for `max_readers` simultaneous guards
    pub fn new(max_readers: usize) -> Self {
        let slots = (0..max_readers.max(1))
            .map(|_| CachePadded::new(AtomicU64::new(VACANT)))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            clock: CachePadded::new(AtomicU64::new(0)),
            slots,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Bytes of shared state needed for `max_readers` slots
    pub fn shmem_size(max_readers: usize) -> usize {
        std::mem::size_of::<CachePadded<AtomicU64>>() * (max_readers.max(1) + 1)
    }

    /// Next logical timestamp (never 0, strictly increasing)
    pub fn now(&self) -> Epoch {
        self.clock.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Publish an epoch for the calling traversal
    ///
    /// The returned guard retracts the epoch when dropped. If every slot is
    /// taken the call backs off until one frees up.
    pub fn pin(&self) -> EpochGuard<'_> {
        let epoch = self.now();
        let len = self.slots.len();
        let backoff = Backoff::new();

        loop {
            let start = self.cursor.fetch_add(1, Ordering::Relaxed) % len;
            for offset in 0..len {
                let slot = (start + offset) % len;
                if self.slots[slot]
                    .compare_exchange(VACANT, epoch, Ordering::SeqCst, Ordering::Relaxed)
                    .is_ok()
                {
                    return EpochGuard {
                        registry: self,
                        slot,
                        epoch,
                    };
                }
            }
            tracing::trace!(slots = len, "epoch table full, backing off");
            backoff.snooze();
        }
    }

    /// Oldest epoch currently published, if any reader is pinned
    pub fn oldest_published(&self) -> Option<Epoch> {
        self.slots
            .iter()
            .map(|slot| slot.load(Ordering::SeqCst))
            .filter(|&epoch| epoch != VACANT)
            .min()
    }

    /// Number of guards currently pinned
    pub fn active(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.load(Ordering::SeqCst) != VACANT)
            .count()
    }

    /// Number of publication slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn retract(&self, slot: usize) {
        self.slots[slot].store(VACANT, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for EpochRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpochRegistry")
            .field("clock", &self.clock.load(Ordering::Relaxed))
            .field("capacity", &self.capacity())
            .field("active", &self.active())
            .finish()
    }
}

/// A published epoch; retracted on drop
#[must_use = "the epoch is retracted as soon as the guard is dropped"]
pub struct EpochGuard<'a> {
    registry: &'a EpochRegistry,
    slot: usize,
    epoch: Epoch,
}

impl EpochGuard<'_> {
    /// The epoch this guard published
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }
}

impl Drop for EpochGuard<'_> {
    fn drop(&mut self) {
        self.registry.retract(self.slot);
    }
}

impl std::fmt::Debug for EpochGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpochGuard")
            .field("slot", &self.slot)
            .field("epoch", &self.epoch)
            .finish()
    }
}
