//! Background prefetch loop feeding the reader's block channel.

use std::io::SeekFrom;
use std::sync::Arc;

use bytes::Bytes;
use cx_error::ReadError;
use cx_traits::SegmentSource;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, trace};

/// The sources vector travels into the loop task and comes back through the
/// join, so at any moment exactly one owner can touch the sources.
pub(crate) type Sources = Vec<Box<dyn SegmentSource>>;

/// Receiving ends of the prefetch pipeline.
pub(crate) struct PrefetchChannels {
    /// Byte blocks in stream order. The capacity bounds prefetch memory.
    pub blocks: mpsc::Receiver<Bytes>,

    /// Terminal error slot; left empty on a clean end of stream.
    pub errors: mpsc::Receiver<ReadError>,
}

/// Control handles of a running loop.
pub(crate) struct PrefetchTask {
    cancel: CancellationToken,
    handle: JoinHandle<Sources>,
}

impl PrefetchTask {
    /// Cancels the loop and waits for it to hand the sources back.
    ///
    /// Returns `None` only if the loop task panicked, in which case the
    /// sources are gone with it.
    pub(crate) async fn stop(self) -> Option<Sources> {
        self.cancel.cancel();
        match self.handle.await {
            Ok(sources) => Some(sources),
            Err(join_err) => {
                error!(error = %join_err, "prefetch task failed to join");
                None
            }
        }
    }
}

/// Spawns the prefetch loop at absolute position `start`.
pub(crate) fn spawn(
    sources: Sources,
    prefix: Arc<[u64]>,
    start: u64,
    block_size: usize,
    block_count: usize,
) -> (PrefetchChannels, PrefetchTask) {
    let (block_tx, blocks) = mpsc::channel(block_count);
    let (err_tx, errors) = mpsc::channel(1);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(run(
        sources,
        prefix,
        start,
        block_size,
        block_tx,
        err_tx,
        cancel.clone(),
    ));
    (
        PrefetchChannels { blocks, errors },
        PrefetchTask { cancel, handle },
    )
}

/// The loop proper.
///
/// Every block is a fresh allocation so the consumer can keep the tail of
/// one block as its window while the next is being filled. Publication is
/// the cancellation point. On exit the channels close by drop and the
/// sources return to the caller through the join.
async fn run(
    mut sources: Sources,
    prefix: Arc<[u64]>,
    start: u64,
    block_size: usize,
    block_tx: mpsc::Sender<Bytes>,
    err_tx: mpsc::Sender<ReadError>,
    cancel: CancellationToken,
) -> Sources {
    let total = prefix[prefix.len() - 1];
    let mut pos = start;

    loop {
        if pos >= total {
            trace!(pos, "prefetch reached end of stream");
            return sources;
        }

        // Smallest index whose segment ends past `pos`; the strict bound
        // skips zero-sized sources.
        let index = prefix[1..].partition_point(|&end| end <= pos);
        let local = pos - prefix[index];
        let remain = prefix[index + 1] - pos;

        if let Err(error) = sources[index].seek(SeekFrom::Start(local)).await {
            publish(&err_tx, ReadError::Io(error));
            return sources;
        }

        let want = remain.min(block_size as u64) as usize;
        let mut block = vec![0u8; want];
        match sources[index].read(&mut block).await {
            Ok(0) => {
                // Source ran dry before its declared size; move past it.
                pos = prefix[index + 1];
            }
            Ok(n) => {
                block.truncate(n);
                tokio::select! {
                    // Teardown must win over a ready publication.
                    biased;
                    _ = cancel.cancelled() => {
                        publish(&err_tx, ReadError::Cancelled);
                        return sources;
                    }
                    sent = block_tx.send(Bytes::from(block)) => {
                        if sent.is_err() {
                            // Receiver dropped; nobody is listening any more.
                            return sources;
                        }
                        trace!(index, n, pos, "block published");
                        pos += n as u64;
                    }
                }
            }
            Err(error) => {
                publish(&err_tx, ReadError::Io(error));
                return sources;
            }
        }
    }
}

/// Publishes into the 1-slot error channel; an occupied slot keeps the first
/// error.
fn publish(err_tx: &mpsc::Sender<ReadError>, error: ReadError) {
    let _ = err_tx.try_send(error);
}
