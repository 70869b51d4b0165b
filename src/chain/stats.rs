//! Chain counters
//!
//! Relaxed atomic counters; readers may see slightly stale values but never
//! torn ones.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters owned by `VersionChains`
#[derive(Debug, Default)]
pub(crate) struct ChainCounters {
    pub(crate) appends: AtomicU64,
    pub(crate) lookups: AtomicU64,
    pub(crate) lookup_hits: AtomicU64,
    pub(crate) lost_claims: AtomicU64,
    pub(crate) fix_ups_by_appender: AtomicU64,
    pub(crate) fix_ups_by_cutter: AtomicU64,
    pub(crate) cuts_deferred: AtomicU64,
    pub(crate) reclaimed: AtomicU64,
}

impl ChainCounters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ChainStats {
        ChainStats {
            appends: self.appends.load(Ordering::Relaxed),
            lookups: self.lookups.load(Ordering::Relaxed),
            lookup_hits: self.lookup_hits.load(Ordering::Relaxed),
            lost_claims: self.lost_claims.load(Ordering::Relaxed),
            fix_ups_by_appender: self.fix_ups_by_appender.load(Ordering::Relaxed),
            fix_ups_by_cutter: self.fix_ups_by_cutter.load(Ordering::Relaxed),
            cuts_deferred: self.cuts_deferred.load(Ordering::Relaxed),
            reclaimed: self.reclaimed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the chain counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChainStats {
    /// Versions linked by `append`
    pub appends: u64,

    /// Calls to `lookup`
    pub lookups: u64,

    /// Lookups that found a visible version
    pub lookup_hits: u64,

    /// Appender claims that found the tail already claimed for deletion
    pub lost_claims: u64,

    /// Splices an appender performed on a cutter's behalf
    pub fix_ups_by_appender: u64,

    /// Splices a cutter performed itself
    pub fix_ups_by_cutter: u64,

    /// Cuts handed over to a concurrent appender
    pub cuts_deferred: u64,

    /// Slots returned to the arena free list
    pub reclaimed: u64,
}

impl ChainStats {
    /// Total nodes spliced out, by either side
    pub fn fix_ups(&self) -> u64 {
        self.fix_ups_by_appender + self.fix_ups_by_cutter
    }
}

impl fmt::Display for ChainStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "appends={} lookups={} hits={} lost_claims={} fix_ups(appender={} cutter={}) deferred={} reclaimed={}",
            self.appends,
            self.lookups,
            self.lookup_hits,
            self.lost_claims,
            self.fix_ups_by_appender,
            self.fix_ups_by_cutter,
            self.cuts_deferred,
            self.reclaimed,
        )
    }
}
