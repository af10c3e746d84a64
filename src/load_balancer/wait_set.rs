//! Routing wait set.
//!
//! Requests that find no healthy backend park here until the health monitor
//! reports a `healthy` or `recovery` transition. Every parked request is
//! released on each such transition and receives the index of the backend
//! that became healthy.
//!
//! A `watch` channel carries the last healthy backend index. Callers take a
//! [`Waiter`] *before* scanning the status store, so a transition that lands
//! between the scan and the wait is still observed.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::watch;

use crate::observability::metrics;

#[derive(Debug)]
pub struct RoutingWaitSet {
    tx: watch::Sender<Option<usize>>,
    pending: AtomicUsize,
}

impl RoutingWaitSet {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            tx,
            pending: AtomicUsize::new(0),
        }
    }

    /// Start observing transitions from this point on.
    pub fn register(&self) -> Waiter<'_> {
        Waiter {
            set: self,
            rx: self.tx.subscribe(),
        }
    }

    /// Wake every parked request with `index`.
    pub fn release(&self, index: usize) {
        self.tx.send_replace(Some(index));
    }

    /// True once any backend has been reported healthy.
    pub fn is_ready(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Resolve once any backend has been reported healthy (cold-start gate).
    pub async fn ready(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(Option::is_some).await;
    }

    /// Number of requests currently parked.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}

impl Default for RoutingWaitSet {
    fn default() -> Self {
        Self::new()
    }
}

/// A registration on the wait set that has not yet parked.
pub struct Waiter<'a> {
    set: &'a RoutingWaitSet,
    rx: watch::Receiver<Option<usize>>,
}

impl Waiter<'_> {
    /// Park until the next healthy transition and return that backend index.
    ///
    /// Dropping the returned future unregisters the waiter.
    pub async fn next_healthy(mut self) -> usize {
        let _parked = Parked::new(&self.set.pending);
        loop {
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
            if let Some(index) = *self.rx.borrow_and_update() {
                return index;
            }
        }
    }
}

/// Keeps the pending count accurate even when the waiting future is dropped.
struct Parked<'a> {
    pending: &'a AtomicUsize,
}

impl<'a> Parked<'a> {
    fn new(pending: &'a AtomicUsize) -> Self {
        let now = pending.fetch_add(1, Ordering::AcqRel) + 1;
        metrics::record_waiting_requests(now);
        Self { pending }
    }
}

impl Drop for Parked<'_> {
    fn drop(&mut self) {
        let now = self.pending.fetch_sub(1, Ordering::AcqRel) - 1;
        metrics::record_waiting_requests(now);
    }
}
