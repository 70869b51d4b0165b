//! Error types for vchain
//!
//! Provides a unified error type for the recoverable failures.
//!
//! A missing chain or a chain with no visible version is not an error: lookups
//! return `None` for that. Protocol invariant violations (an unexpected baton
//! state, a corrupted handle) are not represented here either; they panic,
//! because the chain's safety argument cannot survive them.

use thiserror::Error;

use crate::node::NodeHandle;

/// Result type alias using ChainError
pub type Result<T> = std::result::Result<T, ChainError>;

/// Unified error type for vchain operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    // -------------------------------------------------------------------------
    // Arena Errors
    // -------------------------------------------------------------------------
    #[error("Node arena exhausted ({capacity} slots in use)")]
    ArenaExhausted { capacity: usize },

    // -------------------------------------------------------------------------
    // Structural Errors
    // -------------------------------------------------------------------------
    #[error("Broken link at node {at}: expected back link to {expected}, found {found}")]
    BrokenLink {
        at: NodeHandle,
        expected: NodeHandle,
        found: NodeHandle,
    },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    InvalidConfig(String),
}
