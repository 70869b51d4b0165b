//! Consensus baton
//!
//! A single atomically exchanged byte per node. An appender and a cutter that
//! target the same node each swap in their own claim and, in the same step,
//! learn whether the other side got there first.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// The three states a baton can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BatonState {
    /// No claim outstanding
    Idle = 0,

    /// An appender is linking a new version after this node
    AppendClaimed = 1,

    /// A cutter has claimed this node for removal
    DeleteClaimed = 2,
}

impl BatonState {
    /// Decode a raw baton byte
    ///
    /// # Panics
    /// Any value outside the three states means the node memory is corrupt.
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => BatonState::Idle,
            1 => BatonState::AppendClaimed,
            2 => BatonState::DeleteClaimed,
            other => panic!("corrupted baton value {other:#04x}"),
        }
    }
}

impl fmt::Display for BatonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BatonState::Idle => "idle",
            BatonState::AppendClaimed => "append-claimed",
            BatonState::DeleteClaimed => "delete-claimed",
        };
        f.write_str(name)
    }
}

/// Atomic tri-state cell
pub struct Baton(AtomicU8);

impl Baton {
    /// Create an idle baton
    pub const fn new() -> Self {
        Self(AtomicU8::new(BatonState::Idle as u8))
    }

    /// Current state
    pub fn load(&self) -> BatonState {
        BatonState::from_raw(self.0.load(Ordering::SeqCst))
    }

    /// Install `state` and return whatever was there before
    pub fn swap(&self, state: BatonState) -> BatonState {
        BatonState::from_raw(self.0.swap(state as u8, Ordering::SeqCst))
    }

    /// Install `new` only if the baton currently holds `current`
    ///
    /// On failure the state actually held is returned and nothing changes.
    pub fn compare_exchange(
        &self,
        current: BatonState,
        new: BatonState,
    ) -> Result<BatonState, BatonState> {
        self.0
            .compare_exchange(current as u8, new as u8, Ordering::SeqCst, Ordering::SeqCst)
            .map(BatonState::from_raw)
            .map_err(BatonState::from_raw)
    }

    /// Force the baton back to idle (slot reuse only)
    pub(crate) fn reset(&self) {
        self.0.store(BatonState::Idle as u8, Ordering::SeqCst);
    }
}

impl Default for Baton {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Baton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Baton").field(&self.load()).finish()
    }
}
