//! Node Store Module
//!
//! Fixed-capacity arena that owns every version node and sentinel.
//!
//! ## Responsibilities
//! - Hand out node slots addressed by `NodeHandle`, never by pointer
//! - Resolve handles back to nodes for the chain protocol
//! - Hold spliced-out nodes until no published epoch predates their removal
//! - Recycle reclaimed slots through a free list
//!
//! ## Slot Lifecycle
//! ```text
//!   unused ──allocate──► linked ──fix-up──► removed ──retire──► retired
//!     ▲                                                           │
//!     └──────────────── free list ◄──── reclaim(oldest epoch) ────┘
//! ```

mod arena;

pub use arena::NodeArena;
