//! Pipelined flavor: flush and commit run on a dedicated worker.

use std::sync::Arc;

use cx_error::{PipeError, PipeResult};
use cx_traits::{Consumer, Cookie, Lease, Producer};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use crate::config::PipeConfig;
use crate::coordinator::MAX_ITEMS;

/// One coalesced buffer handed to the flush worker: the items plus every
/// cookie whose lease contributed to them, in arrival order.
struct WorkUnit<T> {
    items: Vec<T>,
    cookies: Vec<Cookie>,
}

/// Batching coordinator that overlaps producing with flushing.
///
/// A single worker owns both `process` and `commit` for buffers delivered
/// over a bounded queue. One worker is what keeps the guarantees cheap: the
/// consumer sees at most one `process` in flight, and commits leave in the
/// exact order cookies arrived at the producer, with no cross-buffer
/// coordination.
///
/// Unlike [`pipe`](crate::pipe), this flavor flushes a pending non-empty
/// buffer when the producer runs dry before shutting the worker down.
pub struct PipelinedPipe {
    config: PipeConfig,
}

impl PipelinedPipe {
    /// Creates a pipelined pipe with the given configuration.
    pub fn new(config: PipeConfig) -> Self {
        Self { config }
    }

    /// Runs the pipe until the producer is exhausted or an operation fails.
    ///
    /// The first error observed wins: worker errors are polled before every
    /// `next`, and whichever side fails first has its error returned after
    /// the worker is torn down. A cancelled worker drops undelivered
    /// buffers without processing or committing them.
    pub async fn run<P, C, T>(&self, producer: Arc<P>, consumer: Arc<C>) -> PipeResult<()>
    where
        P: Producer<Item = T> + 'static,
        C: Consumer<Item = T> + 'static,
        T: Send + 'static,
    {
        let (work_tx, work_rx) = mpsc::channel::<WorkUnit<T>>(self.config.queue_depth);
        let (err_tx, mut err_rx) = mpsc::channel::<PipeError>(1);
        let cancel = CancellationToken::new();

        let worker = tokio::spawn(flush_worker(
            work_rx,
            Arc::clone(&producer),
            Arc::clone(&consumer),
            err_tx,
            cancel.clone(),
        ));

        let mut items: Vec<T> = Vec::new();
        let mut cookies: Vec<Cookie> = Vec::new();
        let mut result: PipeResult<()> = Ok(());

        loop {
            // Surface a worker failure before pulling more input.
            if let Ok(err) = err_rx.try_recv() {
                result = Err(err);
                break;
            }

            match producer.next().await {
                Err(cause) => {
                    result = Err(PipeError::Read(cause));
                    break;
                }
                Ok(None) => {
                    // Tail flush: this flavor does not drop a pending buffer.
                    if !items.is_empty() {
                        debug!(items = items.len(), "flushing tail buffer");
                        let unit = WorkUnit {
                            items: std::mem::take(&mut items),
                            cookies: std::mem::take(&mut cookies),
                        };
                        // A send failure means the worker already exited;
                        // its error is picked up after the join.
                        let _ = work_tx.send(unit).await;
                    }
                    break;
                }
                Ok(Some(Lease {
                    items: incoming,
                    cookie,
                })) => {
                    if items.len() + incoming.len() <= MAX_ITEMS {
                        items.extend(incoming);
                        cookies.push(cookie);
                        continue;
                    }

                    trace!(
                        items = items.len(),
                        cookies = cookies.len(),
                        "buffer full, handing to worker"
                    );
                    let unit = WorkUnit {
                        items: std::mem::take(&mut items),
                        cookies: std::mem::take(&mut cookies),
                    };
                    if work_tx.send(unit).await.is_err() {
                        // Worker exited; the error slot has the cause.
                        break;
                    }
                    items = incoming;
                    cookies.push(cookie);
                }
            }
        }

        if result.is_err() {
            // Stop the worker promptly; undelivered buffers are dropped.
            cancel.cancel();
        }
        drop(work_tx);
        if let Err(join_err) = worker.await {
            error!(error = %join_err, "flush worker panicked");
        }
        if result.is_ok() {
            if let Ok(err) = err_rx.try_recv() {
                result = Err(err);
            }
        }
        result
    }
}

impl Default for PipelinedPipe {
    fn default() -> Self {
        Self::new(PipeConfig::new())
    }
}

/// Worker loop: processes buffers in receive order, which equals send order,
/// and commits their cookies in arrival order. The first failure is
/// published to the 1-slot error channel and ends the worker.
async fn flush_worker<P, C, T>(
    mut work_rx: mpsc::Receiver<WorkUnit<T>>,
    producer: Arc<P>,
    consumer: Arc<C>,
    err_tx: mpsc::Sender<PipeError>,
    cancel: CancellationToken,
) where
    P: Producer<Item = T>,
    C: Consumer<Item = T>,
    T: Send,
{
    loop {
        let unit = tokio::select! {
            // Cancellation must win over a ready buffer.
            biased;
            _ = cancel.cancelled() => {
                trace!("flush worker cancelled");
                return;
            }
            unit = work_rx.recv() => match unit {
                Some(unit) => unit,
                // Queue closed: coordinator is done with us.
                None => return,
            },
        };

        let WorkUnit { items, cookies } = unit;
        let count = items.len();
        if let Err(cause) = consumer.process(items).await {
            let _ = err_tx.try_send(PipeError::Process(cause));
            return;
        }
        trace!(items = count, cookies = cookies.len(), "buffer processed");

        for cookie in cookies {
            if let Err(cause) = producer.commit(cookie).await {
                let _ = err_tx.try_send(PipeError::Commit { cookie, cause });
                return;
            }
        }
    }
}
