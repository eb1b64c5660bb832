//! Concatenating, seekable byte stream with background prefetch.
//!
//! [`MultiReader`] presents N sized sources
//! ([`SegmentSource`](cx_traits::SegmentSource)) as one logical byte stream
//! and transparently pipelines reads: a single background loop runs ahead of
//! the caller, filling a bounded channel of byte blocks, so consuming and
//! fetching overlap.
//!
//! # Architecture
//!
//! - [`PrefetchConfig`] - block size and channel capacity; the capacity
//!   bounds prefetch memory at roughly `block_count * block_size` bytes
//! - prefetch loop - background task that owns the sources while it runs,
//!   locates the active source through a prefix-sum table, and publishes
//!   fresh blocks; hands the sources back when it exits
//! - [`MultiReader`] - the facade: `read` drains a window fed from the block
//!   channel, `seek` lands inside the window for free or tears the loop down
//!   for a restart, `close` cancels the loop and closes every source exactly
//!   once
//!
//! # Concurrency
//!
//! One caller at a time drives `read`/`seek`; the only supported overlap is
//! `close` from another task, which promptly unblocks a pending `read`
//! without deadlocking. The internal mutex is never held across an await.

mod config;
mod prefetch;
mod reader;

#[cfg(test)]
mod testutil;

pub use config::{PrefetchConfig, DEFAULT_BLOCK_COUNT, DEFAULT_BLOCK_SIZE};
pub use reader::MultiReader;
