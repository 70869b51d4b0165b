//! Snapshot lookup
//!
//! Walks a chain from the newest version towards the oldest and returns the
//! first one whose creator the snapshot can see.

use crate::index::PrimaryKey;
use crate::mvcc::{Snapshot, VisibilityPredicate};

use super::stats::ChainCounters;
use super::{VersionChains, VisibleVersion};

impl<P: VisibilityPredicate> VersionChains<P> {
    /// Find the version of `key` visible under `snapshot`
    ///
    /// Returns `None` if the key has no chain, the chain is empty, or no
    /// version is visible. Never blocks on writers or the cutter.
    pub fn lookup(&self, key: PrimaryKey, snapshot: &Snapshot) -> Option<VisibleVersion> {
        ChainCounters::bump(&self.counters.lookups);

        // Step 1: Resolve the sentinel (partition lock released on return)
        let sentinel = self.index.lookup(&key, key.hash_code())?;

        // Step 2: Publish our epoch before touching any node; the guard
        // retracts it on every return below
        let _guard = self.epochs.pin();

        // Step 3: Empty chain
        let mut cursor = self.arena.resolve(sentinel).prev();
        if cursor == sentinel {
            return None;
        }

        // Step 4: Newest → oldest until the first visible creator
        while cursor != sentinel {
            let node = self.arena.resolve(cursor);
            if self.predicate.is_visible(node.creator(), snapshot) {
                ChainCounters::bump(&self.counters.lookup_hits);
                return Some(VisibleVersion::from(node));
            }
            cursor = node.prev();
        }

        None
    }
}
