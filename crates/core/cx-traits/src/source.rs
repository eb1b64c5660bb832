//! Byte source seam for the concatenating multi-reader.

use std::io::{self, SeekFrom};

use async_trait::async_trait;

/// A readable, seekable, closable byte source that knows its own length.
///
/// The multi-reader owns its sources from construction until close. Sources
/// are driven exclusively by the prefetch loop (seek + read) and by the
/// reader's close (close), never concurrently; methods therefore take
/// `&mut self`.
#[async_trait]
pub trait SegmentSource: Send {
    /// Reads up to `buf.len()` bytes at the current position.
    ///
    /// Conventional byte-stream semantics: `Ok(0)` means this source is
    /// exhausted.
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Repositions the source. Only `SeekFrom::Start` is issued by the
    /// prefetch loop.
    async fn seek(&mut self, pos: SeekFrom) -> io::Result<u64>;

    /// Releases the source. Called exactly once, during the reader's close.
    async fn close(&mut self) -> io::Result<()>;

    /// Total number of bytes this source can serve.
    ///
    /// Must be stable for the lifetime of the source; the multi-reader
    /// queries it once at construction and caches the result.
    fn size(&self) -> u64;
}
