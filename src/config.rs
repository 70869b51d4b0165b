//! Configuration for vchain
//!
//! Centralized configuration with sensible defaults.

use crossbeam::utils::Backoff;

use crate::error::{ChainError, Result};

/// Main configuration for a `VersionChains` instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Arena Configuration
    // -------------------------------------------------------------------------
    /// Number of node slots in the arena (sentinels and versions share it)
    pub arena_capacity: usize,

    // -------------------------------------------------------------------------
    // Index Configuration
    // -------------------------------------------------------------------------
    /// Number of chains (primary keys) expected to be live at once.
    /// Used for sizing only; the index grows past it if needed.
    pub expected_chains: usize,

    /// Number of index partitions, each with its own RwLock
    pub index_partitions: usize,

    // -------------------------------------------------------------------------
    // Epoch Configuration
    // -------------------------------------------------------------------------
    /// Max concurrently pinned epoch guards (readers, appenders, cutters)
    pub max_readers: usize,

    // -------------------------------------------------------------------------
    // Contention Configuration
    // -------------------------------------------------------------------------
    /// How a losing appender (or a waiting cutter) waits before re-checking
    pub backoff: BackoffStrategy,
}

/// Wait strategy used by the busy-wait points of the protocol
///
/// The choice never affects correctness, only latency and CPU use under
/// contention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// Pure CPU spin with a spin-loop hint
    Spin,

    /// Exponential spin that escalates to yielding (crossbeam `Backoff`)
    Snooze,

    /// Yield the thread to the scheduler on every check
    Yield,
}

impl BackoffStrategy {
    /// Busy-wait until `done` returns true
    pub fn wait_until(self, mut done: impl FnMut() -> bool) {
        let backoff = Backoff::new();
        while !done() {
            match self {
                BackoffStrategy::Spin => std::hint::spin_loop(),
                BackoffStrategy::Snooze => backoff.snooze(),
                BackoffStrategy::Yield => std::thread::yield_now(),
            }
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            arena_capacity: 1 << 18, // 256K nodes
            expected_chains: 64 * 1024,
            index_partitions: 128,
            max_readers: 256,
            backoff: BackoffStrategy::Snooze,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the config for values the arena, index or registry can't use
    pub fn validate(&self) -> Result<()> {
        if self.arena_capacity == 0 {
            return Err(ChainError::InvalidConfig(
                "arena_capacity must be greater than zero".to_string(),
            ));
        }
        // Handles are u32 slot indices
        if self.arena_capacity > u32::MAX as usize {
            return Err(ChainError::InvalidConfig(format!(
                "arena_capacity {} exceeds the handle range",
                self.arena_capacity
            )));
        }
        if self.index_partitions == 0 || !self.index_partitions.is_power_of_two() {
            return Err(ChainError::InvalidConfig(format!(
                "index_partitions must be a non-zero power of two, got {}",
                self.index_partitions
            )));
        }
        if self.max_readers == 0 {
            return Err(ChainError::InvalidConfig(
                "max_readers must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the number of node slots in the arena
    pub fn arena_capacity(mut self, slots: usize) -> Self {
        self.config.arena_capacity = slots;
        self
    }

    /// Set the expected number of live chains
    pub fn expected_chains(mut self, count: usize) -> Self {
        self.config.expected_chains = count;
        self
    }

    /// Set the number of index partitions (power of two)
    pub fn index_partitions(mut self, count: usize) -> Self {
        self.config.index_partitions = count;
        self
    }

    /// Set the maximum number of concurrently pinned epoch guards
    pub fn max_readers(mut self, count: usize) -> Self {
        self.config.max_readers = count;
        self
    }

    /// Set the back-off strategy for the protocol's wait points
    pub fn backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.config.backoff = strategy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
