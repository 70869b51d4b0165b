//! MVCC Visibility Module
//!
//! Snapshots and the predicate that decides whether a version's creator is
//! visible to one.
//!
//! The chain never interprets transaction ids itself; it asks a
//! `VisibilityPredicate`. The default `SnapshotVisibility` follows the usual
//! xmin/xmax/in-progress rule.

use std::collections::HashSet;
use std::fmt;

/// Transaction id of a version's creator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TxnId(pub u64);

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// A reader's view of which transactions have committed
///
/// - every id below `xmin` had finished when the snapshot was taken
/// - every id at or above `xmax` had not started
/// - ids in between are finished unless listed in `in_progress`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub xmin: TxnId,
    pub xmax: TxnId,
    pub in_progress: HashSet<TxnId>,
}

impl Snapshot {
    /// Snapshot with no concurrent transactions
    pub fn new(xmin: TxnId, xmax: TxnId) -> Self {
        Self {
            xmin,
            xmax,
            in_progress: HashSet::new(),
        }
    }

    /// Snapshot that sees every transaction below `xmax`
    pub fn at(xmax: u64) -> Self {
        Self::new(TxnId(xmax), TxnId(xmax))
    }

    /// Mark `txn` as still running when the snapshot was taken
    pub fn with_in_progress(mut self, txn: TxnId) -> Self {
        self.in_progress.insert(txn);
        if txn < self.xmin {
            self.xmin = txn;
        }
        self
    }

    /// True if `txn` was running or not yet started when the snapshot was
    /// taken, i.e. its effects must stay hidden
    pub fn hides(&self, txn: TxnId) -> bool {
        if txn < self.xmin {
            return false;
        }
        if txn >= self.xmax {
            return true;
        }
        self.in_progress.contains(&txn)
    }
}

/// Decides whether a version created by `creator` is visible to `snapshot`
pub trait VisibilityPredicate: Send + Sync {
    fn is_visible(&self, creator: TxnId, snapshot: &Snapshot) -> bool;
}

/// Default predicate: visible unless the snapshot hides the creator
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotVisibility;

impl VisibilityPredicate for SnapshotVisibility {
    fn is_visible(&self, creator: TxnId, snapshot: &Snapshot) -> bool {
        !snapshot.hides(creator)
    }
}

impl<F> VisibilityPredicate for F
where
    F: Fn(TxnId, &Snapshot) -> bool + Send + Sync,
{
    fn is_visible(&self, creator: TxnId, snapshot: &Snapshot) -> bool {
        self(creator, snapshot)
    }
}
