//! Fix-up
//!
//! The splice that logically deletes a node. Called exactly once per removed
//! node, by whichever side of the consensus protocol owns the splice; it does
//! not check for double invocation itself.

use std::sync::atomic::{fence, Ordering};

use crate::node::NodeHandle;

use super::stats::ChainCounters;
use super::{FixUpPerformer, VersionChains};

impl<P> VersionChains<P> {
    /// Splice `mid` out of its chain and stamp its removal time
    pub(crate) fn fix_up(&self, mid: NodeHandle, performer: FixUpPerformer) {
        let node = self.arena.resolve(mid);

        // Step 1: Neighbours
        let prev_handle = node.prev();
        let next_handle = node.next();
        let prev = self.arena.resolve(prev_handle);
        let next = self.arena.resolve(next_handle);

        // Step 2: Splice around mid
        prev.set_next(next_handle);
        next.set_prev(prev_handle);

        // Step 3: Nobody may see the stamp before the splice
        fence(Ordering::SeqCst);

        // Step 4: Stamp
        node.mark_deleted(self.epochs.now());

        match performer {
            FixUpPerformer::Appender => ChainCounters::bump(&self.counters.fix_ups_by_appender),
            FixUpPerformer::Cutter => ChainCounters::bump(&self.counters.fix_ups_by_cutter),
        }
        tracing::trace!(
            node = %mid,
            prev = %prev_handle,
            next = %next_handle,
            ?performer,
            "node spliced out"
        );

        if let Some(observer) = &self.observer {
            observer.fixed_up(mid, performer);
        }
    }
}
