//! Concatenating, seekable, prefetching reader facade.

use std::io::SeekFrom;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::{Buf, Bytes};
use cx_error::{CloseError, ReadError, ReadResult};
use cx_traits::SegmentSource;
use tracing::{debug, trace, warn};

use crate::config::PrefetchConfig;
use crate::prefetch::{self, PrefetchChannels, PrefetchTask, Sources};

/// Seekable byte stream that logically concatenates several sized sources.
///
/// The reader owns its sources from construction until [`close`]. Reads are
/// served from an in-memory window fed by a background prefetch loop that is
/// started lazily on the first read, restarted after a seek that misses the
/// window, and terminated on close or at end of stream.
///
/// Methods take `&self`: one caller at a time drives [`read`]/[`seek`], and
/// [`close`] may additionally be called from another task to unblock a
/// pending read.
///
/// [`read`]: MultiReader::read
/// [`seek`]: MultiReader::seek
/// [`close`]: MultiReader::close
pub struct MultiReader {
    /// Cumulative source sizes; entry 0 is 0, the last entry is the total.
    /// Maps an absolute position to (source index, local offset).
    prefix: Arc<[u64]>,
    total: u64,
    config: PrefetchConfig,
    inner: Mutex<Inner>,
}

struct Inner {
    /// Sources, held here whenever the prefetch loop is not running.
    sources: Option<Sources>,

    /// Bytes buffered ahead of the caller; the front byte sits at `pos`.
    /// Shrunk from the front as bytes are delivered.
    window: Bytes,

    /// Absolute position of the next byte to deliver.
    pos: u64,

    /// Receiving ends of the prefetch pipeline. Taken out by `read` while it
    /// waits on a block so the lock is not held across the await.
    channels: Option<PrefetchChannels>,

    /// Cancellation and join handles of the running prefetch loop.
    task: Option<PrefetchTask>,

    /// Terminal prefetch error observed after a partial read; surfaced by
    /// the next `read` call.
    pending: Option<ReadError>,

    closed: bool,
}

impl MultiReader {
    /// Creates a reader over `sources` in concatenation order.
    ///
    /// Source sizes are queried exactly once here and cached in the
    /// prefix-sum table; no other I/O happens until the first read.
    pub fn new(config: PrefetchConfig, sources: Vec<Box<dyn SegmentSource>>) -> Self {
        // A zero capacity or block size would wedge the pipeline.
        let config = PrefetchConfig {
            block_size: config.block_size.max(1),
            block_count: config.block_count.max(1),
        };

        let mut prefix = Vec::with_capacity(sources.len() + 1);
        prefix.push(0u64);
        for source in &sources {
            let last = prefix[prefix.len() - 1];
            prefix.push(last + source.size());
        }
        let total = prefix[prefix.len() - 1];

        Self {
            prefix: prefix.into(),
            total,
            config,
            inner: Mutex::new(Inner {
                sources: Some(sources),
                window: Bytes::new(),
                pos: 0,
                channels: None,
                task: None,
                pending: None,
                closed: false,
            }),
        }
    }

    /// Total size of the concatenated stream, served from the cached table.
    pub fn size(&self) -> u64 {
        self.total
    }

    /// Reads up to `buf.len()` bytes at the current position.
    ///
    /// Returns `Ok(0)` at end of stream and for an empty `buf` (the latter
    /// without touching prefetch). A terminal prefetch error observed after
    /// some bytes were already copied is returned by the *next* call; the
    /// current call still delivers the bytes.
    pub async fn read(&self, buf: &mut [u8]) -> ReadResult<usize> {
        {
            let mut inner = self.lock();
            if inner.closed {
                return Err(ReadError::Closed);
            }
            if let Some(error) = inner.pending.take() {
                return Err(error);
            }
            if buf.is_empty() {
                return Ok(0);
            }
            if inner.pos == self.total {
                return Ok(0);
            }
            if inner.task.is_none() {
                self.start_prefetch(&mut inner);
            }
        }

        let mut copied = 0;
        loop {
            // Window drained; wait for the next block with the lock released
            // so the loop can publish. Scoped in a block so the guard is
            // provably dropped before the await below, even across the
            // loop's back-edge.
            let mut channels = {
                let mut inner = self.lock();
                if !inner.window.is_empty() {
                    let n = inner.window.len().min(buf.len() - copied);
                    buf[copied..copied + n].copy_from_slice(&inner.window[..n]);
                    inner.window.advance(n);
                    inner.pos += n as u64;
                    copied += n;
                    if copied == buf.len() {
                        return Ok(copied);
                    }
                }

                let Some(channels) = inner.channels.take() else {
                    // Torn down underneath us by a concurrent close.
                    return if copied > 0 {
                        Ok(copied)
                    } else {
                        Err(ReadError::Closed)
                    };
                };
                channels
            };

            let block = channels.blocks.recv().await;

            let mut inner = self.lock();
            match block {
                Some(block) => {
                    trace!(len = block.len(), pos = inner.pos, "block received");
                    inner.window = block;
                    inner.channels = Some(channels);
                }
                None => {
                    // Prefetch finished; a clean end of stream leaves the
                    // error slot empty.
                    let terminal = channels.errors.try_recv().ok();
                    inner.channels = Some(channels);
                    return match terminal {
                        None => Ok(copied),
                        Some(error) if copied > 0 => {
                            inner.pending = Some(error);
                            Ok(copied)
                        }
                        Some(error) => Err(error),
                    };
                }
            }
        }
    }

    /// Repositions the stream and returns the new absolute position.
    ///
    /// A target inside the buffered window just advances the window: no
    /// I/O, prefetch untouched. Any other target drops the window and stops
    /// a running prefetch loop; the next read restarts it at the new
    /// position, which is when the underlying source seek happens.
    pub async fn seek(&self, pos: SeekFrom) -> ReadResult<u64> {
        let (target, teardown) = {
            let mut inner = self.lock();
            if inner.closed {
                return Err(ReadError::Closed);
            }

            let wanted: i128 = match pos {
                SeekFrom::Start(offset) => offset as i128,
                SeekFrom::Current(offset) => inner.pos as i128 + offset as i128,
                SeekFrom::End(offset) => self.total as i128 + offset as i128,
            };
            if wanted < 0 || wanted > self.total as i128 {
                return Err(ReadError::InvalidSeek {
                    target: wanted as i64,
                    size: self.total,
                });
            }
            let target = wanted as u64;

            if target >= inner.pos && target - inner.pos < inner.window.len() as u64 {
                let delta = (target - inner.pos) as usize;
                inner.window.advance(delta);
                inner.pos = target;
                trace!(target, "seek within window");
                return Ok(target);
            }

            // Window miss: drop buffered bytes and stop a running loop so
            // the next read restarts it at the new position.
            inner.window = Bytes::new();
            inner.pending = None;
            inner.channels = None;
            inner.pos = target;
            (target, inner.task.take())
        };

        if let Some(task) = teardown {
            debug!(target, "seek outside window, stopping prefetch");
            // Joined with the lock released: the loop may be parked on its
            // final publication.
            if let Some(sources) = task.stop().await {
                self.lock().sources = Some(sources);
            }
        }
        Ok(target)
    }

    /// Closes the reader and every source, in order.
    ///
    /// Idempotent: the second call is a no-op returning `Ok(())`. A close
    /// racing an active read unblocks it promptly. Source close failures do
    /// not short-circuit; they are aggregated into
    /// [`CloseError`](cx_error::CloseError) so every cause stays
    /// discoverable.
    pub async fn close(&self) -> ReadResult<()> {
        let (task, idle_sources) = {
            let mut inner = self.lock();
            if inner.closed {
                return Ok(());
            }
            inner.closed = true;
            inner.window = Bytes::new();
            inner.pending = None;
            inner.channels = None;
            (inner.task.take(), inner.sources.take())
        };

        // Join with the lock released so the loop's final publication cannot
        // deadlock against us; the join hands the sources back.
        let sources = match task {
            Some(task) => task.stop().await,
            None => idle_sources,
        };
        let Some(mut sources) = sources else {
            return Ok(());
        };

        debug!(sources = sources.len(), "closing reader");
        let mut failures = Vec::new();
        for (index, source) in sources.iter_mut().enumerate() {
            if let Err(error) = source.close().await {
                warn!(index, error = %error, "source close failed");
                failures.push((index, error));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(CloseError::new(failures).into())
        }
    }

    /// Starts the prefetch loop at the current position. Caller holds the
    /// lock.
    fn start_prefetch(&self, inner: &mut Inner) {
        let Some(sources) = inner.sources.take() else {
            return;
        };
        debug!(start = inner.pos, "starting prefetch");
        let (channels, task) = prefetch::spawn(
            sources,
            Arc::clone(&self.prefix),
            inner.pos,
            self.config.block_size,
            self.config.block_count,
        );
        inner.channels = Some(channels);
        inner.task = Some(task);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
