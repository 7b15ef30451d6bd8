use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::debug;

use crate::errors::Error;

/// Outcome of one refresh cycle as seen by every waiter.
pub type RefreshResult = Result<String, Arc<Error>>;

/// A caller parked until the in-flight refresh settles.
#[derive(Debug)]
pub struct PendingRequest {
    tx: oneshot::Sender<RefreshResult>,
    enqueued_at: Instant,
}

impl PendingRequest {
    /// Delivers the outcome. Returns false when the waiter has gone away.
    fn settle(self, outcome: &RefreshResult) -> bool {
        let waited_ms = self.enqueued_at.elapsed().as_millis() as u64;
        let delivered = self.tx.send(outcome.clone()).is_ok();
        if !delivered {
            debug!(waited_ms, "refresh waiter dropped before settlement");
        }
        delivered
    }
}

/// FIFO of callers blocked on a refresh. Entries only leave through [`RequestQueue::drain`].
#[derive(Debug, Default)]
pub struct RequestQueue {
    pending: VecDeque<PendingRequest>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self) -> oneshot::Receiver<RefreshResult> {
        let (tx, rx) = oneshot::channel();
        self.pending.push_back(PendingRequest {
            tx,
            enqueued_at: Instant::now(),
        });
        rx
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Empties the queue in one pass. Settle the result outside any lock.
    pub fn drain(&mut self) -> Drained {
        Drained {
            pending: std::mem::take(&mut self.pending),
        }
    }
}

/// Waiters taken out of a [`RequestQueue`], not yet told the outcome.
#[derive(Debug)]
#[must_use = "drained waiters must be settled"]
pub struct Drained {
    pending: VecDeque<PendingRequest>,
}

impl Drained {
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Resolves every waiter in enqueue order; returns how many were still listening.
    pub fn settle(self, outcome: &RefreshResult) -> usize {
        self.pending
            .into_iter()
            .map(|waiter| waiter.settle(outcome))
            .filter(|delivered| *delivered)
            .count()
    }
}
