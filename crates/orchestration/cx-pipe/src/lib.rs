//! Ordered batching mediator between a producer and a consumer.
//!
//! The pipe drains a [`Producer`](cx_traits::Producer), coalesces leased
//! batches into a buffer of at most [`MAX_ITEMS`] items, flushes each full
//! buffer to a [`Consumer`](cx_traits::Consumer), and only then commits the
//! contributing cookies back to the producer, in arrival order.
//!
//! # Flavors
//!
//! - [`pipe`] - everything runs inline on the caller's task; the producer
//!   waits while a buffer is processed and committed.
//! - [`PipelinedPipe`] - flush and commit run on a dedicated worker behind a
//!   bounded queue, so the coordinator can keep filling the next buffer while
//!   the previous one is being processed. The two flavors differ in one more
//!   observable way: only the pipelined flavor flushes a pending buffer when
//!   the producer runs dry.
//!
//! # Guarantees
//!
//! - At most [`MAX_ITEMS`] items per `process` call.
//! - No cookie is committed before its buffer's `process` succeeded.
//! - Commits happen in cookie arrival order; a failed commit stops the
//!   group, leaving earlier commits intact and later ones unattempted.
//! - Errors abort the run; nothing is retried.

mod config;
mod coordinator;
mod pipelined;

#[cfg(test)]
mod testutil;

pub use config::{PipeConfig, DEFAULT_QUEUE_DEPTH};
pub use coordinator::{pipe, MAX_ITEMS};
pub use pipelined::PipelinedPipe;
