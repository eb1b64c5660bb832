//! Shared mocks for pipe tests.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use cx_traits::{Consumer, Cookie, Lease, Producer};

/// Test error with a recognizable identity for downcast assertions.
#[derive(Debug)]
pub struct MarkerError(pub &'static str);

impl fmt::Display for MarkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for MarkerError {}

pub fn make_items(start: usize, count: usize) -> Vec<i64> {
    (start..start + count).map(|v| v as i64).collect()
}

/// Scripted producer: hands out the given leases, then either a read error
/// or end of input. Records every commit.
pub struct MockProducer {
    leases: Mutex<VecDeque<Lease<i64>>>,
    read_error: Mutex<Option<MarkerError>>,
    fail_commit_at: Option<Cookie>,
    commit_attempts: Mutex<Vec<Cookie>>,
    committed: Mutex<Vec<Cookie>>,
}

impl MockProducer {
    pub fn new(leases: Vec<Lease<i64>>) -> Self {
        Self {
            leases: Mutex::new(leases.into()),
            read_error: Mutex::new(None),
            fail_commit_at: None,
            commit_attempts: Mutex::new(Vec::new()),
            committed: Mutex::new(Vec::new()),
        }
    }

    /// Fails `next` with the given error once the scripted leases run out.
    pub fn with_read_error(self, error: MarkerError) -> Self {
        *self.read_error.lock().unwrap() = Some(error);
        self
    }

    /// Rejects the commit of the given cookie.
    pub fn with_commit_error_at(mut self, cookie: Cookie) -> Self {
        self.fail_commit_at = Some(cookie);
        self
    }

    /// Cookies whose commit was attempted, in call order.
    pub fn commit_attempts(&self) -> Vec<Cookie> {
        self.commit_attempts.lock().unwrap().clone()
    }

    /// Cookies whose commit succeeded, in call order.
    pub fn committed(&self) -> Vec<Cookie> {
        self.committed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Producer for MockProducer {
    type Item = i64;

    async fn next(&self) -> anyhow::Result<Option<Lease<i64>>> {
        if let Some(lease) = self.leases.lock().unwrap().pop_front() {
            return Ok(Some(lease));
        }
        match self.read_error.lock().unwrap().take() {
            Some(error) => Err(anyhow::Error::new(error)),
            None => Ok(None),
        }
    }

    async fn commit(&self, cookie: Cookie) -> anyhow::Result<()> {
        self.commit_attempts.lock().unwrap().push(cookie);
        if self.fail_commit_at == Some(cookie) {
            anyhow::bail!("commit rejected for cookie {cookie}");
        }
        self.committed.lock().unwrap().push(cookie);
        Ok(())
    }
}

/// Recording consumer that also tracks how many `process` calls overlap.
pub struct MockConsumer {
    processed: Mutex<Vec<Vec<i64>>>,
    fail: bool,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockConsumer {
    pub fn new() -> Self {
        Self {
            processed: Mutex::new(Vec::new()),
            fail: false,
            delay: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Fails every `process` call (after recording the batch).
    pub fn with_process_error(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Sleeps inside `process` so overlapping calls would be observable.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every batch handed to `process`, in call order.
    pub fn processed(&self) -> Vec<Vec<i64>> {
        self.processed.lock().unwrap().clone()
    }

    /// Highest number of `process` calls that were in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Consumer for MockConsumer {
    type Item = i64;

    async fn process(&self, items: Vec<i64>) -> anyhow::Result<()> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.processed.lock().unwrap().push(items);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("process failed");
        }
        Ok(())
    }
}
