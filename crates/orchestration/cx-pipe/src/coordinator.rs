//! Synchronous batching coordinator.

use cx_error::{PipeError, PipeResult};
use cx_traits::{Consumer, Cookie, Lease, Producer};
use tracing::{debug, trace};

/// Upper bound on the number of items handed to a single `process` call.
pub const MAX_ITEMS: usize = 9999;

/// Drains `producer` until it is exhausted or an operation fails.
///
/// Leased batches are coalesced into a buffer of at most [`MAX_ITEMS`] items.
/// When an incoming lease no longer fits, the buffer is flushed to
/// `consumer` and its cookies are committed in arrival order; the incoming
/// lease then starts the next buffer.
///
/// A buffer still pending when the producer runs dry is dropped without a
/// flush; use [`PipelinedPipe`](crate::PipelinedPipe) when the tail must be
/// delivered.
///
/// # Errors
///
/// The first failure aborts the run: a `next` failure becomes
/// [`PipeError::Read`], a `process` failure becomes [`PipeError::Process`]
/// (none of that buffer's cookies are committed), and a `commit` failure
/// becomes [`PipeError::Commit`] (earlier commits stand, later cookies are
/// never attempted). Nothing is retried.
pub async fn pipe<P, C, T>(producer: &P, consumer: &C) -> PipeResult<()>
where
    P: Producer<Item = T> + ?Sized,
    C: Consumer<Item = T> + ?Sized,
    T: Send,
{
    let mut items: Vec<T> = Vec::new();
    let mut cookies: Vec<Cookie> = Vec::new();

    loop {
        let lease = producer.next().await.map_err(PipeError::Read)?;
        let Some(Lease {
            items: incoming,
            cookie,
        }) = lease
        else {
            debug!(pending_items = items.len(), "producer exhausted");
            return Ok(());
        };

        if items.len() + incoming.len() <= MAX_ITEMS {
            items.extend(incoming);
            cookies.push(cookie);
            continue;
        }

        trace!(
            items = items.len(),
            cookies = cookies.len(),
            "buffer full, flushing"
        );
        consumer
            .process(std::mem::take(&mut items))
            .await
            .map_err(PipeError::Process)?;
        for cookie in cookies.drain(..) {
            producer
                .commit(cookie)
                .await
                .map_err(|cause| PipeError::Commit { cookie, cause })?;
        }

        items = incoming;
        cookies.push(cookie);
    }
}
