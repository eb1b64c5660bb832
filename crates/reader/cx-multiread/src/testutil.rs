//! In-memory segment source for reader tests.

use std::io::{self, SeekFrom};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cx_traits::SegmentSource;

/// In-memory source that records how it is driven.
///
/// Counters are shared handles so tests can keep observing them after the
/// segment has been boxed and moved into the reader.
pub struct MockSegment {
    data: Vec<u8>,
    pos: u64,
    close_error: Option<String>,
    read_delay: Option<Duration>,
    fail_read_at: Option<u64>,
    size_calls: Arc<AtomicUsize>,
    seek_calls: Arc<AtomicUsize>,
    read_calls: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl MockSegment {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
            close_error: None,
            read_delay: None,
            fail_read_at: None,
            size_calls: Arc::new(AtomicUsize::new(0)),
            seek_calls: Arc::new(AtomicUsize::new(0)),
            read_calls: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Fails `close` with the given message (after marking the segment
    /// closed).
    pub fn with_close_error(mut self, message: impl Into<String>) -> Self {
        self.close_error = Some(message.into());
        self
    }

    /// Sleeps inside every `read` call.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Fails any `read` that starts at or past the given position.
    pub fn with_read_failure_at(mut self, pos: u64) -> Self {
        self.fail_read_at = Some(pos);
        self
    }

    pub fn size_calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.size_calls)
    }

    pub fn seek_calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.seek_calls)
    }

    pub fn read_calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.read_calls)
    }

    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

#[async_trait]
impl SegmentSource for MockSegment {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(fail_at) = self.fail_read_at {
            if self.pos >= fail_at {
                return Err(io::Error::other("segment exploded"));
            }
        }

        let pos = self.pos as usize;
        if pos >= self.data.len() {
            return Ok(0);
        }
        let n = buf.len().min(self.data.len() - pos);
        buf[..n].copy_from_slice(&self.data[pos..pos + n]);
        self.pos += n as u64;
        Ok(n)
    }

    async fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.seek_calls.fetch_add(1, Ordering::SeqCst);
        let len = self.data.len() as i64;
        let target = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::Current(offset) => self.pos as i64 + offset,
            SeekFrom::End(offset) => len + offset,
        };
        if target < 0 || target > len {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek out of range",
            ));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }

    async fn close(&mut self) -> io::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        match &self.close_error {
            Some(message) => Err(io::Error::other(message.clone())),
            None => Ok(()),
        }
    }

    fn size(&self) -> u64 {
        self.size_calls.fetch_add(1, Ordering::SeqCst);
        self.data.len() as u64
    }
}
