//! Tests for VersionChains
//!
//! These tests verify:
//! - Init, config validation and sizing
//! - Append/lookup basics and snapshot visibility
//! - Empty and missing chains
//! - Cut, retire and reclaim (with and without pinned readers)
//! - Chain well-formedness after mixed operations

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use vchain::{
    shmem_size, ChainError, Config, CutOutcome, NodeHandle, PrimaryKey, Snapshot, TupleLocator,
    TxnId, VersionChains, VisibilityPredicate,
};

// =============================================================================
// Helper Functions
// =============================================================================

fn test_config() -> Config {
    Config::builder()
        .arena_capacity(256)
        .expected_chains(16)
        .index_partitions(4)
        .max_readers(16)
        .build()
}

fn setup_chains() -> VersionChains {
    VersionChains::init(test_config()).unwrap()
}

fn append_version(chains: &VersionChains, key: PrimaryKey, txn: u64) -> NodeHandle {
    let handle = chains.allocate(TxnId(txn), TupleLocator(txn * 100)).unwrap();
    chains.append(key, handle).unwrap();
    handle
}

// =============================================================================
// Init / Config Tests
// =============================================================================

#[test]
fn test_init_with_default_config() {
    let chains = VersionChains::init(Config::default()).unwrap();
    assert!(chains.index().is_empty());
    assert_eq!(chains.arena().live(), 0);
    assert_eq!(chains.stats(), vchain::ChainStats::default());
}

#[test]
fn test_invalid_config_rejected() {
    let bad = [
        Config::builder().arena_capacity(0).build(),
        Config::builder().index_partitions(0).build(),
        Config::builder().index_partitions(12).build(),
        Config::builder().max_readers(0).build(),
    ];

    for config in bad {
        match VersionChains::init(config) {
            Err(ChainError::InvalidConfig(_)) => {}
            other => panic!("expected InvalidConfig, got {:?}", other.map(|_| ())),
        }
    }
}

#[test]
fn test_shmem_size_grows_with_expected_chains() {
    let small = Config::builder().expected_chains(10).build();
    let large = Config::builder().expected_chains(10_000).build();

    assert!(shmem_size(&small) > 0);
    assert!(shmem_size(&large) > shmem_size(&small));
}

// =============================================================================
// Lookup Tests
// =============================================================================

#[test]
fn test_lookup_missing_key() {
    let chains = setup_chains();
    assert_eq!(chains.lookup(PrimaryKey(1), &Snapshot::at(100)), None);
    assert_eq!(chains.epochs().active(), 0);
}

#[test]
fn test_append_then_lookup() {
    let chains = setup_chains();
    let key = PrimaryKey(1);
    let v1 = append_version(&chains, key, 1);

    let found = chains.lookup(key, &Snapshot::at(2)).unwrap();
    assert_eq!(found.handle, v1);
    assert_eq!(found.creator, TxnId(1));
    assert_eq!(found.locator, TupleLocator(100));
    assert_eq!(chains.epochs().active(), 0);
}

#[test]
fn test_lookup_returns_newest_visible() {
    let chains = setup_chains();
    let key = PrimaryKey(1);
    let v1 = append_version(&chains, key, 1);
    let v2 = append_version(&chains, key, 2);
    let v3 = append_version(&chains, key, 3);

    assert_eq!(chains.lookup(key, &Snapshot::at(2)).unwrap().handle, v1);
    assert_eq!(chains.lookup(key, &Snapshot::at(3)).unwrap().handle, v2);
    assert_eq!(chains.lookup(key, &Snapshot::at(4)).unwrap().handle, v3);
}

#[test]
fn test_lookup_skips_in_progress_creator() {
    let chains = setup_chains();
    let key = PrimaryKey(1);
    let v1 = append_version(&chains, key, 1);
    append_version(&chains, key, 2);

    let snapshot = Snapshot::at(10).with_in_progress(TxnId(2));
    assert_eq!(chains.lookup(key, &snapshot).unwrap().handle, v1);
}

#[test]
fn test_lookup_nothing_visible() {
    let chains = setup_chains();
    let key = PrimaryKey(1);
    append_version(&chains, key, 5);

    assert_eq!(chains.lookup(key, &Snapshot::at(5)), None);
    assert_eq!(chains.epochs().active(), 0);
}

#[test]
fn test_lookup_is_repeatable_without_writers() {
    let chains = setup_chains();
    let key = PrimaryKey(1);
    for txn in 1..=5 {
        append_version(&chains, key, txn);
    }

    let snapshot = Snapshot::at(4);
    let first = chains.lookup(key, &snapshot);
    for _ in 0..10 {
        assert_eq!(chains.lookup(key, &snapshot), first);
    }
}

#[test]
fn test_empty_chain_never_consults_predicate() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let predicate = move |_: TxnId, _: &Snapshot| {
        counter.fetch_add(1, Ordering::SeqCst);
        true
    };
    let chains = VersionChains::with_predicate(test_config(), predicate).unwrap();
    let key = PrimaryKey(1);

    // Create the chain, then empty it
    let v1 = chains.allocate(TxnId(1), TupleLocator(1)).unwrap();
    chains.append(key, v1).unwrap();
    assert_eq!(chains.remove(v1), CutOutcome::Spliced);

    let sentinel = chains.sentinel(key).unwrap();
    assert_eq!(chains.node(sentinel).prev(), sentinel);

    assert_eq!(chains.lookup(key, &Snapshot::at(100)), None);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(chains.epochs().active(), 0);
}

#[test]
fn test_keys_are_independent() {
    let chains = setup_chains();
    let a = append_version(&chains, PrimaryKey(1), 1);
    let b = append_version(&chains, PrimaryKey(2), 2);

    assert_eq!(chains.lookup(PrimaryKey(1), &Snapshot::at(10)).unwrap().handle, a);
    assert_eq!(chains.lookup(PrimaryKey(2), &Snapshot::at(10)).unwrap().handle, b);
    assert_eq!(chains.index().len(), 2);
}

// =============================================================================
// Append Tests
// =============================================================================

#[test]
fn test_append_orders_newest_first() {
    let chains = setup_chains();
    let key = PrimaryKey(1);
    let handles: Vec<_> = (1..=4).map(|txn| append_version(&chains, key, txn)).collect();

    let versions: Vec<_> = chains.versions(key).iter().map(|v| v.handle).collect();
    let expected: Vec<_> = handles.iter().rev().copied().collect();
    assert_eq!(versions, expected);
    assert_eq!(chains.verify_chain(key).unwrap(), 4);
    assert_eq!(chains.stats().appends, 4);
}

#[test]
fn test_append_fails_when_arena_cannot_hold_sentinel() {
    let config = Config::builder()
        .arena_capacity(1)
        .index_partitions(1)
        .build();
    let chains = VersionChains::init(config).unwrap();

    let v1 = chains.allocate(TxnId(1), TupleLocator(1)).unwrap();
    let err = chains.append(PrimaryKey(1), v1).unwrap_err();

    assert_eq!(err, ChainError::ArenaExhausted { capacity: 1 });
    assert!(chains.index().is_empty());
}

#[test]
#[should_panic(expected = "cannot append sentinel")]
fn test_append_sentinel_panics() {
    let chains = setup_chains();
    let key = PrimaryKey(1);
    append_version(&chains, key, 1);
    let sentinel = chains.sentinel(key).unwrap();
    chains.append(PrimaryKey(2), sentinel).unwrap();
}

// =============================================================================
// Cut / Reclaim Tests
// =============================================================================

#[test]
fn test_cut_middle_version() {
    let chains = setup_chains();
    let key = PrimaryKey(1);
    let v1 = append_version(&chains, key, 1);
    let v2 = append_version(&chains, key, 2);
    let v3 = append_version(&chains, key, 3);

    assert_eq!(chains.cut(v2), CutOutcome::Spliced);

    assert!(chains.node(v2).is_removed());
    assert_eq!(chains.node(v1).next(), v3);
    assert_eq!(chains.node(v3).prev(), v1);
    assert_eq!(chains.verify_chain(key).unwrap(), 2);
    assert_eq!(chains.stats().fix_ups_by_cutter, 1);
}

#[test]
fn test_cut_tail_then_append() {
    let chains = setup_chains();
    let key = PrimaryKey(1);
    let v1 = append_version(&chains, key, 1);
    let v2 = append_version(&chains, key, 2);

    assert_eq!(chains.cut(v2), CutOutcome::Spliced);
    let sentinel = chains.sentinel(key).unwrap();
    assert_eq!(chains.node(sentinel).prev(), v1);

    let v3 = append_version(&chains, key, 3);
    assert_eq!(chains.node(v3).prev(), v1);
    assert_eq!(chains.verify_chain(key).unwrap(), 2);
}

#[test]
fn test_removed_version_no_longer_visible() {
    let chains = setup_chains();
    let key = PrimaryKey(1);
    let v1 = append_version(&chains, key, 1);
    let v2 = append_version(&chains, key, 2);

    chains.remove(v2);
    assert_eq!(chains.lookup(key, &Snapshot::at(10)).unwrap().handle, v1);
}

#[test]
fn test_removal_timestamp_follows_reader_epochs() {
    let chains = setup_chains();
    let key = PrimaryKey(1);
    let v1 = append_version(&chains, key, 1);
    append_version(&chains, key, 2);

    let guard = chains.epochs().pin();
    chains.remove(v1);

    assert!(chains.node(v1).deleted_at().unwrap() > guard.epoch());
}

#[test]
#[should_panic(expected = "already removed")]
fn test_double_cut_panics() {
    let chains = setup_chains();
    let key = PrimaryKey(1);
    let v1 = append_version(&chains, key, 1);
    append_version(&chains, key, 2);

    chains.cut(v1);
    chains.cut(v1);
}

#[test]
#[should_panic(expected = "cannot cut sentinel")]
fn test_cut_sentinel_panics() {
    let chains = setup_chains();
    let key = PrimaryKey(1);
    append_version(&chains, key, 1);
    chains.cut(chains.sentinel(key).unwrap());
}

#[test]
fn test_pinned_reader_blocks_reclaim() {
    let chains = setup_chains();
    let key = PrimaryKey(1);
    let v1 = append_version(&chains, key, 1);
    append_version(&chains, key, 2);

    let reader = chains.epochs().pin();
    chains.remove(v1);

    assert_eq!(chains.reclaim(), 0);
    assert_eq!(chains.arena().retired(), 1);

    drop(reader);
    assert_eq!(chains.reclaim(), 1);
    assert_eq!(chains.stats().reclaimed, 1);
}

#[test]
fn test_reader_pinned_after_removal_does_not_block_reclaim() {
    let chains = setup_chains();
    let key = PrimaryKey(1);
    let v1 = append_version(&chains, key, 1);
    append_version(&chains, key, 2);

    chains.remove(v1);
    let _reader = chains.epochs().pin();

    assert_eq!(chains.reclaim(), 1);
}

#[test]
fn test_reclaimed_slot_is_reused() {
    let config = Config::builder()
        .arena_capacity(3)
        .index_partitions(1)
        .build();
    let chains = VersionChains::init(config).unwrap();
    let key = PrimaryKey(1);

    // sentinel + v1 + v2 fill the arena
    let v1 = append_version(&chains, key, 1);
    append_version(&chains, key, 2);
    assert!(matches!(
        chains.allocate(TxnId(3), TupleLocator(3)),
        Err(ChainError::ArenaExhausted { .. })
    ));

    chains.remove(v1);
    chains.reclaim();

    let v3 = append_version(&chains, key, 3);
    assert_eq!(v3, v1);
    assert_eq!(chains.verify_chain(key).unwrap(), 2);
    assert_eq!(chains.lookup(key, &Snapshot::at(10)).unwrap().creator, TxnId(3));
}

// =============================================================================
// Well-formedness Tests
// =============================================================================

#[test]
fn test_chain_well_formed_after_mixed_operations() {
    let chains = setup_chains();
    let key = PrimaryKey(1);

    let mut live = Vec::new();
    for txn in 1..=20 {
        live.push(append_version(&chains, key, txn));
        if txn % 3 == 0 {
            // Drop the oldest surviving version
            let oldest = live.remove(0);
            chains.remove(oldest);
        }
    }
    chains.reclaim();

    assert_eq!(chains.verify_chain(key).unwrap(), live.len());

    // Walk next then prev from the sentinel, N times, and come back
    let sentinel = chains.sentinel(key).unwrap();
    let mut at = sentinel;
    for _ in 0..=live.len() {
        let next = chains.node(at).next();
        assert_eq!(chains.node(next).prev(), at);
        at = next;
    }
    assert_eq!(at, sentinel);
}

#[test]
fn test_verify_missing_chain_is_empty() {
    let chains = setup_chains();
    assert_eq!(chains.verify_chain(PrimaryKey(404)).unwrap(), 0);
    assert!(chains.versions(PrimaryKey(404)).is_empty());
}

// =============================================================================
// End-to-End Scenario
// =============================================================================

#[test]
fn test_reader_pinned_across_append() {
    let chains = setup_chains();
    let key = PrimaryKey(7);

    let v1 = append_version(&chains, key, 1);
    assert_eq!(chains.lookup(key, &Snapshot::at(2)).unwrap().handle, v1);

    // A reader publishes its epoch before v2 exists
    let reader = chains.epochs().pin();
    let v2 = append_version(&chains, key, 2);

    // The old snapshot still resolves to v1, a new one sees v2
    assert_eq!(chains.lookup(key, &Snapshot::at(2)).unwrap().handle, v1);
    assert_eq!(chains.lookup(key, &Snapshot::at(3)).unwrap().handle, v2);

    // v1 can be cut but not recycled while the reader is pinned
    chains.remove(v1);
    assert_eq!(chains.reclaim(), 0);
    assert_eq!(chains.node(v1).creator(), TxnId(1));

    drop(reader);
    assert_eq!(chains.reclaim(), 1);
    assert_eq!(chains.verify_chain(key).unwrap(), 1);
}

/// Visibility rule that, on its first call, appends a newer version and cuts
/// the oldest one while the calling lookup is still walking the chain
struct WriteDuringLookup {
    chains: Arc<OnceLock<Weak<VersionChains<WriteDuringLookup>>>>,
    key: PrimaryKey,
    fired: AtomicBool,
}

impl VisibilityPredicate for WriteDuringLookup {
    fn is_visible(&self, creator: TxnId, snapshot: &Snapshot) -> bool {
        if !self.fired.swap(true, Ordering::SeqCst) {
            if let Some(chains) = self.chains.get().and_then(Weak::upgrade) {
                let v2 = chains.allocate(TxnId(2), TupleLocator(200)).unwrap();
                chains.append(self.key, v2).unwrap();

                let oldest = chains.versions(self.key).last().unwrap().handle;
                chains.remove(oldest);
                chains.reclaim();
            }
        }
        !snapshot.hides(creator)
    }
}

#[test]
fn test_lookup_in_flight_across_append_and_cut() {
    let slot = Arc::new(OnceLock::new());
    let key = PrimaryKey(8);
    let predicate = WriteDuringLookup {
        chains: Arc::clone(&slot),
        key,
        fired: AtomicBool::new(false),
    };
    let chains = Arc::new(VersionChains::with_predicate(test_config(), predicate).unwrap());
    let _ = slot.set(Arc::downgrade(&chains));

    let v1 = chains.allocate(TxnId(1), TupleLocator(100)).unwrap();
    chains.append(key, v1).unwrap();

    // The lookup is standing on v1 when v2 is linked and v1 is cut
    let found = chains.lookup(key, &Snapshot::at(2)).unwrap();
    assert_eq!(found.handle, v1);
    assert_eq!(found.creator, TxnId(1));
    assert_eq!(found.locator, TupleLocator(100));

    // The reclaim pass run mid-lookup left v1 alone
    assert!(chains.node(v1).is_removed());
    assert!(chains.node(v1).is_allocated());
    assert_eq!(chains.stats().reclaimed, 0);
    assert_eq!(chains.arena().retired(), 1);

    // Later lookups see the new chain
    let v2 = chains.lookup(key, &Snapshot::at(3)).unwrap().handle;
    assert_eq!(chains.versions(key)[0].handle, v2);
    assert_eq!(chains.lookup(key, &Snapshot::at(2)), None);
    assert_eq!(chains.verify_chain(key).unwrap(), 1);

    assert_eq!(chains.reclaim(), 1);
}
