//! Producer and consumer seams for the batching pipe.

use async_trait::async_trait;

/// Acknowledgement handle paired with a producer batch.
///
/// A cookie identifies the batch it arrived with, not the coalesced buffer
/// that batch ends up in. Arrival order defines commit order.
pub type Cookie = i64;

/// One batch leased from a [`Producer`]: the items plus the cookie that
/// acknowledges them once they have been processed.
#[derive(Debug, Clone)]
pub struct Lease<T> {
    /// Items in arrival order. May be empty; an empty lease still carries a
    /// cookie that must be committed in order.
    pub items: Vec<T>,

    /// Handle to pass back via [`Producer::commit`] after processing.
    pub cookie: Cookie,
}

impl<T> Lease<T> {
    /// Creates a lease from items and their cookie.
    pub fn new(items: Vec<T>, cookie: Cookie) -> Self {
        Self { items, cookie }
    }
}

/// Pull-style source of item batches.
///
/// Methods take `&self` so the pipelined pipe can share one producer between
/// its coordinator (calling [`next`](Producer::next)) and its flush worker
/// (calling [`commit`](Producer::commit)); implementations use interior
/// mutability where they need state.
#[async_trait]
pub trait Producer: Send + Sync {
    /// The opaque item type. The pipe transports items without inspecting
    /// them.
    type Item: Send;

    /// Pulls the next batch.
    ///
    /// Returns `Ok(None)` when the input is exhausted; that is the normal
    /// termination signal, not an error. Any `Err` is a read failure and
    /// aborts the run.
    async fn next(&self) -> anyhow::Result<Option<Lease<Self::Item>>>;

    /// Acknowledges that the batch identified by `cookie` has been
    /// processed.
    ///
    /// The pipe only calls this after the batch's items were handed to the
    /// consumer successfully, and always in cookie arrival order.
    async fn commit(&self, cookie: Cookie) -> anyhow::Result<()>;
}

/// Push-style sink for coalesced batches.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// The opaque item type, matching the producer's.
    type Item: Send;

    /// Processes one coalesced batch.
    ///
    /// The pipe guarantees at most one `process` call in flight at a time,
    /// in both flavors.
    async fn process(&self, items: Vec<Self::Item>) -> anyhow::Result<()>;
}
