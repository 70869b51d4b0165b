//! Tests for the chain index
//!
//! These tests verify:
//! - Hash codes are stable and pick partitions
//! - Lookup misses and hits
//! - Double-checked insert is idempotent, including under races

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use vchain::index::{ChainIndex, PrimaryKey};
use vchain::node::NodeHandle;

// =============================================================================
// Hashing Tests
// =============================================================================

#[test]
fn test_hash_code_is_stable() {
    let key = PrimaryKey(12345);
    assert_eq!(key.hash_code(), key.hash_code());
    assert_eq!(key.hash_code(), crc32fast::hash(&12345u64.to_le_bytes()));
}

#[test]
fn test_same_hash_same_partition_lock() {
    let index = ChainIndex::new(16, 8);
    let hash = PrimaryKey(7).hash_code();

    assert!(std::ptr::eq(index.partition_lock(hash), index.partition_lock(hash)));
    assert!(std::ptr::eq(
        index.partition_lock(hash),
        index.partition_lock(hash.wrapping_add(8))
    ));
}

#[test]
#[should_panic(expected = "not a power of two")]
fn test_partition_count_must_be_power_of_two() {
    ChainIndex::new(16, 6);
}

// =============================================================================
// Lookup / Insert Tests
// =============================================================================

#[test]
fn test_lookup_missing_key() {
    let index = ChainIndex::new(16, 4);
    let key = PrimaryKey(1);
    assert_eq!(index.lookup(&key, key.hash_code()), None);
    assert!(index.is_empty());
}

#[test]
fn test_insert_then_lookup() {
    let index = ChainIndex::new(16, 4);
    let key = PrimaryKey(1);

    let sentinel = index
        .insert_with(key, key.hash_code(), || Ok(NodeHandle::new(3)))
        .unwrap();

    assert_eq!(sentinel, NodeHandle::new(3));
    assert_eq!(index.lookup(&key, key.hash_code()), Some(sentinel));
    assert_eq!(index.len(), 1);
    assert_eq!(index.keys(), vec![key]);
}

#[test]
fn test_insert_existing_keeps_first_and_skips_make() {
    let index = ChainIndex::new(16, 4);
    let key = PrimaryKey(1);

    index
        .insert_with(key, key.hash_code(), || Ok(NodeHandle::new(3)))
        .unwrap();
    let again = index
        .insert_with(key, key.hash_code(), || panic!("must not allocate twice"))
        .unwrap();

    assert_eq!(again, NodeHandle::new(3));
    assert_eq!(index.len(), 1);
}

#[test]
fn test_insert_error_leaves_index_unchanged() {
    let index = ChainIndex::new(16, 4);
    let key = PrimaryKey(1);

    let err = index
        .insert_with(key, key.hash_code(), || {
            Err(vchain::ChainError::ArenaExhausted { capacity: 0 })
        })
        .unwrap_err();

    assert_eq!(err, vchain::ChainError::ArenaExhausted { capacity: 0 });
    assert!(index.is_empty());
}

#[test]
fn test_racing_inserters_agree_on_one_sentinel() {
    let index = Arc::new(ChainIndex::new(16, 4));
    let made = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(8));
    let key = PrimaryKey(99);

    let handles: Vec<_> = (0..8u32)
        .map(|id| {
            let index = Arc::clone(&index);
            let made = Arc::clone(&made);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                index
                    .get_or_insert_with(key, || {
                        made.fetch_add(1, Ordering::SeqCst);
                        Ok(NodeHandle::new(id))
                    })
                    .unwrap()
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(made.load(Ordering::SeqCst), 1);
    assert!(results.iter().all(|&h| h == results[0]));
    assert_eq!(index.len(), 1);
}

#[test]
fn test_many_keys_across_partitions() {
    let index = ChainIndex::new(1024, 16);

    for k in 0..1000u64 {
        let key = PrimaryKey(k);
        index
            .insert_with(key, key.hash_code(), || Ok(NodeHandle::new(k as u32)))
            .unwrap();
    }

    assert_eq!(index.len(), 1000);
    assert_eq!(index.partitions(), 16);
    for k in 0..1000u64 {
        let key = PrimaryKey(k);
        assert_eq!(
            index.lookup(&key, key.hash_code()),
            Some(NodeHandle::new(k as u32))
        );
    }
}
