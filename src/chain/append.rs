//! Lock-free append
//!
//! Links a new version after the current tail. The appender claims the tail's
//! baton, links, releases the baton, and splices the old tail out if a cutter
//! claimed it in between.
//!
//! Appenders on the same chain also exclude each other through the baton: a
//! claim is a compare-and-swap from `Idle`, so it never overwrites another
//! party's claim, and a claim on a node that stopped being the tail before
//! the claim landed is dropped and retried.

use crate::error::Result;
use crate::index::PrimaryKey;
use crate::mvcc::VisibilityPredicate;
use crate::node::{BatonState, NodeHandle};

use super::stats::ChainCounters;
use super::{FixUpPerformer, VersionChains};

/// Result of one attempt to claim a chain's tail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TailClaim {
    /// We hold the tail's baton and the tail can't move until we link
    Won(NodeHandle),

    /// Someone else holds the tail's baton
    Lost { tail: NodeHandle, holder: BatonState },

    /// The tail moved while we were claiming it
    Stale,
}

impl<P: VisibilityPredicate> VersionChains<P> {
    /// Link the allocated node `handle` as the newest version of `key`
    ///
    /// Creates the chain on first use. Returns once the node is linked; the
    /// only failure is running out of arena slots for a new sentinel.
    ///
    /// # Panics
    /// If `handle` is a sentinel or already linked.
    pub fn append(&self, key: PrimaryKey, handle: NodeHandle) -> Result<()> {
        let new_node = self.arena.resolve(handle);
        assert!(!new_node.is_sentinel(), "cannot append sentinel {handle}");
        assert!(
            new_node.prev() == handle && new_node.next() == handle,
            "node {handle} is already linked"
        );

        // Step 1: Resolve or create the sentinel (double-checked insert)
        let sentinel = self
            .index
            .get_or_insert_with(key, || self.arena.allocate_sentinel())?;
        let sentinel_node = self.arena.resolve(sentinel);

        // Step 2: Keep the tail we claim from being reclaimed under us
        let _guard = self.epochs.pin();

        // Step 3: Consensus loop
        loop {
            match self.claim_tail(sentinel) {
                TailClaim::Won(tail) => {
                    self.link_after(sentinel, tail, handle);
                    self.release_tail(tail);
                    break;
                }
                TailClaim::Lost { tail, holder } => {
                    if holder == BatonState::DeleteClaimed {
                        ChainCounters::bump(&self.counters.lost_claims);
                    }
                    tracing::trace!(%key, tail = %tail, %holder, "tail claim lost, waiting");
                    self.config
                        .backoff
                        .wait_until(|| sentinel_node.prev() != tail);
                }
                TailClaim::Stale => continue,
            }
        }

        ChainCounters::bump(&self.counters.appends);
        tracing::trace!(%key, node = %handle, "version appended");
        Ok(())
    }

    /// Claim the baton of the chain's current tail
    pub(crate) fn claim_tail(&self, sentinel: NodeHandle) -> TailClaim {
        let sentinel_node = self.arena.resolve(sentinel);

        let tail = sentinel_node.prev();
        let tail_node = self.arena.resolve(tail);

        if let Err(holder) = tail_node
            .baton()
            .compare_exchange(BatonState::Idle, BatonState::AppendClaimed)
        {
            return TailClaim::Lost { tail, holder };
        }

        // While we hold the claim only we can move the tail off this node
        if sentinel_node.prev() != tail {
            self.release_tail(tail);
            return TailClaim::Stale;
        }

        TailClaim::Won(tail)
    }

    /// Link `new` between the claimed `tail` and the sentinel
    pub(crate) fn link_after(&self, sentinel: NodeHandle, tail: NodeHandle, new: NodeHandle) {
        let new_node = self.arena.resolve(new);
        new_node.set_prev(tail);
        new_node.set_next(sentinel);

        self.arena.resolve(tail).set_next(new);
        self.arena.resolve(sentinel).set_prev(new);
    }

    /// Give up our claim on `tail`, splicing it out if a cutter claimed it
    /// while we held it
    pub(crate) fn release_tail(&self, tail: NodeHandle) {
        match self.arena.resolve(tail).baton().swap(BatonState::Idle) {
            BatonState::AppendClaimed => {}
            BatonState::DeleteClaimed => {
                tracing::trace!(node = %tail, "cutter visited while linking, splicing for it");
                self.fix_up(tail, FixUpPerformer::Appender);
            }
            BatonState::Idle => {
                panic!("baton of {tail} was idle while an appender held it")
            }
        }
    }
}
