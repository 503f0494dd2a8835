//! Error types shared across the crate.
//!
//! Absence is never an error: lookups that miss return `None` and timed
//! waits report a timeout through their return value.

use thiserror::Error;

/// Errors reported by `ChainedTable`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TableError {
    /// A fixed-width table was handed a key of a different length.
    #[error("key is {found} bytes but the table stores {expected}-byte keys")]
    KeyWidth { expected: usize, found: usize },
    /// The bucket array could not be allocated or grown.
    #[error("out of memory while sizing the bucket array")]
    OutOfMemory,
    /// The table was structurally modified after the cursor started.
    #[error("cursor is stale: the table was modified during iteration")]
    StaleCursor,
}

/// Errors reported by `RingQueue`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RingError {
    /// The slot chain could not be allocated or grown. The queue is unchanged.
    #[error("out of memory while growing the ring from {capacity} slots")]
    OutOfMemory { capacity: usize },
}

/// Errors reported while installing the diagnostic subscriber.
#[derive(Debug, Error)]
pub enum TraceError {
    /// The `RUST_LOG` directive could not be parsed.
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),
    /// A global subscriber was already installed.
    #[error("a global subscriber is already installed")]
    Install(#[from] tracing::dispatcher::SetGlobalDefaultError),
}
