//! Epoch Registry Module
//!
//! Tracks how long readers may still be dereferencing chain nodes.
//!
//! ## Responsibilities
//! - Hand out monotonically increasing logical timestamps (`now`)
//! - Publish an epoch for every in-flight traversal (`pin`)
//! - Retract it when the traversal ends, on every exit path (`EpochGuard`)
//! - Report the oldest published epoch to reclamation
//!
//! ## Reclamation Rule
//! A node spliced out at logical time `d` may be reused only once every
//! published epoch is greater than `d`. Readers that pinned before the splice
//! hold an epoch below `d` and keep the node alive; readers that pinned after
//! it cannot reach the node from the sentinel any more.

mod registry;

pub use registry::{EpochGuard, EpochRegistry};

/// Logical timestamp; 0 is reserved for "never"
pub type Epoch = u64;
