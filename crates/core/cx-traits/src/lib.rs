//! Capability traits shared by the conflux kernels.
//!
//! This crate defines the seams between the kernels and their collaborators:
//!
//! - [`Producer`] / [`Consumer`] - the two ends the batching pipe mediates
//!   between, plus the [`Lease`] handed out by producers
//! - [`SegmentSource`] - a sized, seekable byte source concatenated by the
//!   multi-reader
//!
//! Implementations live with the code that owns the actual I/O; the kernels
//! only ever see these traits.

mod pipe;
mod source;

pub use pipe::{Consumer, Cookie, Lease, Producer};
pub use source::SegmentSource;
