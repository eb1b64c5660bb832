//! Error types for the conflux kernels.
//!
//! This crate provides:
//! - [`PipeError`] - failures surfaced by the batching pipe coordinator
//! - [`ReadError`] - failures surfaced by the concatenating multi-reader
//! - [`CloseError`] - aggregate of per-source close failures
//!
//! Collaborator errors are carried as-is (`anyhow::Error` for producers and
//! consumers, `std::io::Error` for byte sources) so callers can recover the
//! original cause with `downcast_ref` after matching the variant.

use std::fmt;
use std::io;

use thiserror::Error;

/// Result alias for pipe operations.
pub type PipeResult<T> = std::result::Result<T, PipeError>;

/// Result alias for multi-reader operations.
pub type ReadResult<T> = std::result::Result<T, ReadError>;

/// Failures surfaced by the batching pipe coordinator.
///
/// Each variant names the operation that failed; the collaborator's error is
/// kept intact inside. The coordinator never retries, so the first failure
/// observed is the one returned.
#[derive(Debug, Error)]
pub enum PipeError {
    /// The producer failed while handing out the next batch.
    #[error("producer read failed: {0}")]
    Read(anyhow::Error),

    /// The consumer rejected a coalesced batch. None of the batch's cookies
    /// have been committed.
    #[error("batch processing failed: {0}")]
    Process(anyhow::Error),

    /// A commit was rejected. Earlier cookies in the group stay committed;
    /// later ones were never attempted.
    #[error("commit failed for cookie {cookie}: {cause}")]
    Commit {
        /// The cookie whose commit failed.
        cookie: i64,
        /// The producer's underlying error.
        cause: anyhow::Error,
    },
}

/// Failures surfaced by the multi-reader.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The reader has been closed; no further operations are possible.
    #[error("reader is closed")]
    Closed,

    /// The prefetch pipeline was torn down while an operation was in flight.
    #[error("prefetch cancelled")]
    Cancelled,

    /// Seek target outside the valid range of the concatenated stream.
    #[error("seek target {target} is outside the valid range 0..={size}")]
    InvalidSeek {
        /// The absolute position the caller asked for.
        target: i64,
        /// Total size of the concatenated stream.
        size: u64,
    },

    /// An underlying source failed during read or seek.
    #[error("source I/O error: {0}")]
    Io(#[from] io::Error),

    /// One or more sources failed to close.
    #[error(transparent)]
    Close(#[from] CloseError),
}

/// Aggregate of per-source close failures.
///
/// Every source is closed exactly once even when earlier closes fail; the
/// failures collect here so each underlying cause stays discoverable through
/// [`failures`](CloseError::failures).
#[derive(Debug)]
pub struct CloseError {
    failures: Vec<(usize, io::Error)>,
}

impl CloseError {
    /// Builds an aggregate from `(source index, error)` pairs.
    pub fn new(failures: Vec<(usize, io::Error)>) -> Self {
        Self { failures }
    }

    /// Iterates over the failed sources in close order.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &io::Error)> {
        self.failures.iter().map(|(index, error)| (*index, error))
    }

    /// Number of sources that failed to close.
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// True when no source failed. An aggregate is only constructed on
    /// failure, so this is normally false.
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for CloseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to close {} source(s):", self.failures.len())?;
        for (index, error) in &self.failures {
            write!(f, " [{index}] {error};")?;
        }
        Ok(())
    }
}

impl std::error::Error for CloseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.failures
            .first()
            .map(|(_, error)| error as &(dyn std::error::Error + 'static))
    }
}
