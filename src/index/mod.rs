//! Chain Index Module
//!
//! Maps a primary key to the sentinel of its version chain.
//!
//! ## Responsibilities
//! - Compute a key's hash code and pick its partition
//! - Shared-mode lookups, exclusive-mode inserts per partition
//! - Idempotent sentinel creation under racing inserters
//!
//! ## Locking
//! Partition locks cover only the hash map operation itself. They are never
//! held while a chain is traversed or mutated.

mod partition;

use std::fmt;

pub use partition::ChainIndex;

/// Fixed-size primary key of a logical row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimaryKey(pub u64);

impl PrimaryKey {
    /// Hash code used to pick the index partition
    pub fn hash_code(&self) -> u32 {
        crc32fast::hash(&self.0.to_le_bytes())
    }
}

impl From<u64> for PrimaryKey {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pk:{}", self.0)
    }
}
