//! chainkit: concurrency and data-structure building blocks.
//!
//! Internal Design:
//!
//! Summary
//! - `ChainedTable`: a separate-chaining hash table over byte-string keys
//!   (NUL-terminated or fixed width) that iterates in insertion order.
//! - `RingQueue`: an unbounded, thread-safe FIFO over a growable circular
//!   chain of slots, with blocking and timed pops.
//! - `Monitor`: a mutex and condition variable pair; the ring is built on it
//!   and it is usable on its own.
//!
//! The table and the ring/monitor pair are independent of each other.
//!
//! Table layout
//! - Entries sit in a `SlotMap` and carry two kinds of links: a bucket
//!   chain (newest first) and a slot in a sentinel-anchored circular ring
//!   kept in insertion order.
//! - The bucket array doubles, on insert only, once entries outnumber
//!   buckets. Doubling relinks bucket chains from cached hashes and never
//!   touches the ring, so iteration order survives growth.
//! - Per table, keys are either copied or kept as the caller's slices
//!   (`KeyOwnership`). Values are handed back on delete; on overwrite they
//!   are returned or, if configured, passed to a release callback.
//! - Dropping the table drops every remaining entry.
//!
//! Concurrency
//! - The table does no locking. Wrap it in a lock to share it.
//! - `RingQueue` holds one `Monitor` over all of its state. `pop` and
//!   `pop_timed` are the only blocking calls, and both re-check emptiness
//!   in a loop around every wait.
//! - `Monitor::broadcast` wakes every waiter, `signal` at most one.
//!
//! Errors
//! - A missing key is `None`, and so is a timed-out pop. Neither is an error.
//! - Allocation failure while growing either structure is reported as
//!   `OutOfMemory` before any state changes.
//!
//! Diagnostics
//! - Components emit `tracing` events. `trace::TraceConfig` builds a
//!   subscriber that can be installed globally or injected per ring.

pub mod chained_table;
#[cfg(test)]
mod chained_table_proptest;
pub mod error;
pub mod monitor;
pub mod one_at_a_time;
pub mod ring_queue;
pub mod table_iter;
pub mod trace;

// Public surface
pub use chained_table::{ChainedTable, Cursor, KeyOwnership, KeyWidth, PutOutcome, TableOptions};
pub use error::{RingError, TableError, TraceError};
pub use monitor::{Monitor, MonitorGuard, WaitOutcome};
pub use one_at_a_time::{OneAtATime, OneAtATimeState};
pub use ring_queue::{RingConfig, RingQueue};
pub use trace::{init_tracing, TraceConfig};
