//! Cutter side of the consensus protocol
//!
//! The cutter decides elsewhere which versions no snapshot can see any more.
//! This module only removes them: claim the node's baton for deletion, splice
//! it out if nobody was there, otherwise leave the splice to the appender
//! that holds the baton.
//!
//! One cutter at a time per chain. After a deferred cut, wait for the node to
//! be removed before cutting one of its neighbours.

use crate::mvcc::VisibilityPredicate;
use crate::node::{BatonState, NodeHandle};

use super::stats::ChainCounters;
use super::{FixUpPerformer, VersionChains};

/// What happened to a node handed to `cut`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutOutcome {
    /// The cutter spliced the node out itself
    Spliced,

    /// An appender held the baton and will splice the node before it returns
    Deferred,
}

impl<P: VisibilityPredicate> VersionChains<P> {
    /// Claim `handle` for removal
    ///
    /// # Panics
    /// If `handle` is a sentinel or was already removed.
    pub fn cut(&self, handle: NodeHandle) -> CutOutcome {
        let node = self.arena.resolve(handle);
        assert!(!node.is_sentinel(), "cannot cut sentinel {handle}");
        assert!(!node.is_removed(), "node {handle} already removed");

        let _guard = self.epochs.pin();

        match node.baton().swap(BatonState::DeleteClaimed) {
            BatonState::Idle => {
                self.fix_up(handle, FixUpPerformer::Cutter);
                CutOutcome::Spliced
            }
            BatonState::AppendClaimed => {
                ChainCounters::bump(&self.counters.cuts_deferred);
                tracing::trace!(node = %handle, "appender holds baton, cut deferred");
                CutOutcome::Deferred
            }
            BatonState::DeleteClaimed => panic!("node {handle} claimed for deletion twice"),
        }
    }

    /// Back off until `handle` has been spliced out (by either side)
    pub fn wait_removed(&self, handle: NodeHandle) {
        let node = self.arena.resolve(handle);
        self.config.backoff.wait_until(|| node.is_removed());
    }

    /// Cut `handle`, wait for the splice if it was deferred, and retire it
    pub fn remove(&self, handle: NodeHandle) -> CutOutcome {
        let outcome = self.cut(handle);
        if outcome == CutOutcome::Deferred {
            self.wait_removed(handle);
        }
        self.arena.retire(handle);
        outcome
    }

    /// Hand a removed node to reclamation
    pub fn retire(&self, handle: NodeHandle) {
        self.arena.retire(handle);
    }

    /// Recycle retired nodes that no pinned reader can still reach
    ///
    /// Returns the number of slots freed.
    pub fn reclaim(&self) -> usize {
        let oldest = self.epochs.oldest_published();
        let freed = self.arena.reclaim(oldest);

        if freed > 0 {
            self.counters
                .reclaimed
                .fetch_add(freed as u64, std::sync::atomic::Ordering::Relaxed);
        }
        tracing::debug!(
            freed,
            ?oldest,
            still_retired = self.arena.retired(),
            "reclaim pass"
        );
        freed
    }
}
