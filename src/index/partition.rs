//! Partitioned chain index
//!
//! A fixed number of `RwLock<HashMap>` partitions selected by the low bits of
//! the key's hash code.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::PrimaryKey;
use crate::error::Result;
use crate::node::NodeHandle;

type Partition = RwLock<HashMap<PrimaryKey, NodeHandle>>;

/// Primary key → sentinel handle
pub struct ChainIndex {
    /// Power-of-two number of partitions
    partitions: Box<[Partition]>,

    /// `partitions.len() - 1`
    mask: u32,
}

impl ChainIndex {
    /// Create an index sized for `expected_chains` keys
    ///
    /// `partitions` must be a power of two.
    pub fn new(expected_chains: usize, partitions: usize) -> Self {
        assert!(
            partitions.is_power_of_two(),
            "partition count {partitions} is not a power of two"
        );
        let per_partition = expected_chains / partitions + 1;
        let partitions = (0..partitions)
            .map(|_| RwLock::new(HashMap::with_capacity(per_partition)))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let mask = (partitions.len() - 1) as u32;

        Self { partitions, mask }
    }

    /// Bytes needed for `entries` keys spread over `partitions` partitions
    pub fn shmem_size(entries: usize, partitions: usize) -> usize {
        let entry = std::mem::size_of::<(PrimaryKey, NodeHandle)>() + std::mem::size_of::<u64>();
        entry * entries + std::mem::size_of::<Partition>() * partitions
    }

    /// Lock guarding the partition that `hash` falls into
    pub fn partition_lock(&self, hash: u32) -> &RwLock<HashMap<PrimaryKey, NodeHandle>> {
        &self.partitions[(hash & self.mask) as usize]
    }

    /// Look up a key's sentinel under the partition's shared lock
    pub fn lookup(&self, key: &PrimaryKey, hash: u32) -> Option<NodeHandle> {
        self.partition_lock(hash).read().get(key).copied()
    }

    /// Insert a sentinel for `key` under the exclusive lock
    ///
    /// If another inserter got there first its sentinel is returned and
    /// `make` is never called.
    pub fn insert_with<F>(&self, key: PrimaryKey, hash: u32, make: F) -> Result<NodeHandle>
    where
        F: FnOnce() -> Result<NodeHandle>,
    {
        let mut partition = self.partition_lock(hash).write();
        if let Some(&existing) = partition.get(&key) {
            return Ok(existing);
        }

        let sentinel = make()?;
        partition.insert(key, sentinel);
        Ok(sentinel)
    }

    /// Shared lookup first, exclusive insert on miss
    pub fn get_or_insert_with<F>(&self, key: PrimaryKey, make: F) -> Result<NodeHandle>
    where
        F: FnOnce() -> Result<NodeHandle>,
    {
        let hash = key.hash_code();
        if let Some(sentinel) = self.lookup(&key, hash) {
            return Ok(sentinel);
        }
        self.insert_with(key, hash, make)
    }

    /// Number of chains in the index
    pub fn len(&self) -> usize {
        self.partitions.iter().map(|p| p.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of partitions
    pub fn partitions(&self) -> usize {
        self.partitions.len()
    }

    /// Every key currently indexed (unordered)
    pub fn keys(&self) -> Vec<PrimaryKey> {
        self.partitions
            .iter()
            .flat_map(|p| p.read().keys().copied().collect::<Vec<_>>())
            .collect()
    }
}

impl std::fmt::Debug for ChainIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainIndex")
            .field("partitions", &self.partitions.len())
            .field("chains", &self.len())
            .finish()
    }
}
