//! Work Queue — bounded FIFO between the Admission Controller and the
//! Worker pool. Built on `flume`'s bounded MPMC channel, the same
//! primitive wired between every pipeline stage elsewhere in this
//! codebase.

use std::time::Duration;

use flume::{Receiver, Sender, TrySendError};

use crate::data::AdmittedItem;

/// A bounded FIFO of admitted items, cloneable so every worker and the
/// Admission Controller can hold their own ends cheaply.
#[derive(Clone)]
pub struct WorkQueue {
    tx: Sender<AdmittedItem>,
    rx: Receiver<AdmittedItem>,
}

impl WorkQueue {
    /// Create a queue bounded at `capacity` items.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = flume::bounded(capacity);
        WorkQueue { tx, rx }
    }

    /// Attempt to enqueue `item` without blocking. Returns `Err(item)` if
    /// the queue is full (the Admission Controller treats this as
    /// `overloaded`, independent of the backpressure-threshold check that
    /// normally catches this first).
    pub fn try_put(&self, item: AdmittedItem) -> Result<(), AdmittedItem> {
        self.tx.try_send(item).map_err(|e| match e {
            TrySendError::Full(item) => item,
            TrySendError::Disconnected(item) => item,
        })
    }

    /// Block the calling worker until an item is available or the queue is
    /// closed (all senders dropped), returning `None` in the latter case.
    pub async fn take(&self) -> Option<AdmittedItem> {
        self.rx.recv_async().await.ok()
    }

    /// Wait up to `timeout` for the next item, used by workers assembling a
    /// batch once they already hold at least one item.
    pub async fn take_with_deadline(&self, timeout: Duration) -> Option<AdmittedItem> {
        tokio::time::timeout(timeout, self.rx.recv_async())
            .await
            .ok()
            .and_then(|r| r.ok())
    }

    /// Current number of items sitting in the queue.
    pub fn size(&self) -> usize {
        self.rx.len()
    }

    /// Configured maximum depth.
    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::AdmittedItem;

    fn item(id: &str) -> AdmittedItem {
        AdmittedItem {
            id: id.to_string(),
            text_blob: "hello".to_string(),
            cache_key: "key".to_string(),
            queued_at: 0.0,
        }
    }

    #[tokio::test]
    async fn put_then_take_round_trips() {
        let q = WorkQueue::new(4);
        q.try_put(item("a")).unwrap();
        let got = q.take().await.unwrap();
        assert_eq!(got.id, "a");
    }

    #[test]
    fn try_put_fails_when_full() {
        let q = WorkQueue::new(1);
        q.try_put(item("a")).unwrap();
        let err = q.try_put(item("b"));
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn take_with_deadline_times_out_on_empty_queue() {
        let q = WorkQueue::new(4);
        let got = q.take_with_deadline(Duration::from_millis(20)).await;
        assert!(got.is_none());
    }

    #[test]
    fn size_reflects_pending_items() {
        let q = WorkQueue::new(4);
        assert_eq!(q.size(), 0);
        q.try_put(item("a")).unwrap();
        q.try_put(item("b")).unwrap();
        assert_eq!(q.size(), 2);
    }
}
