//! FIFO work queue shared by the worker pool
//!
//! `outstanding` counts items that were pushed and have not been completed,
//! including items a worker is currently holding. A retried item goes back on
//! the tail without changing that count. Workers stop only once the queue is
//! closed and `outstanding` reaches zero, so a worker cannot exit while a
//! sibling might still put an item back.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;
use tracing::debug;

use crate::address::WorkItem;

#[derive(Debug, Default)]
pub struct WorkQueue {
    items: Mutex<VecDeque<WorkItem>>,
    outstanding: AtomicUsize,
    closed: AtomicBool,
    aborted: AtomicBool,
    changed: Notify,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_items(&self) -> std::sync::MutexGuard<'_, VecDeque<WorkItem>> {
        // A poisoned lock only means another worker panicked mid-push/pop; the deque is still valid.
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a new item. Ignored after `close()` or `abort()`.
    pub fn push(&self, item: WorkItem) -> bool {
        {
            // Checked under the lock so a concurrent abort() either clears this item or rejects it.
            let mut items = self.lock_items();
            if self.closed.load(Ordering::SeqCst) || self.aborted.load(Ordering::SeqCst) {
                return false;
            }
            self.outstanding.fetch_add(1, Ordering::SeqCst);
            items.push_back(item);
        }
        self.changed.notify_waiters();
        true
    }

    /// Put an item that is still outstanding back at the tail
    pub fn requeue(&self, item: WorkItem) {
        let requeued = {
            let mut items = self.lock_items();
            if self.aborted.load(Ordering::SeqCst) {
                false
            } else {
                items.push_back(item);
                true
            }
        };
        if requeued {
            self.changed.notify_waiters();
        } else {
            self.complete();
        }
    }

    /// Signal that no more new items will be pushed
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.changed.notify_waiters();
    }

    /// Drop every pending item and release all waiting workers.
    /// Items already handed to a worker are still completed normally.
    pub fn abort(&self) {
        let dropped = {
            let mut items = self.lock_items();
            self.aborted.store(true, Ordering::SeqCst);
            self.closed.store(true, Ordering::SeqCst);
            let dropped = items.len();
            items.clear();
            dropped
        };
        if dropped > 0 {
            self.outstanding.fetch_sub(dropped, Ordering::SeqCst);
        }
        debug!("Work queue aborted, {} pending items dropped", dropped);
        self.changed.notify_waiters();
    }

    /// Mark one dequeued item as finished
    pub fn complete(&self) {
        let previous = self.outstanding.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "complete() called more times than push()");
        if previous == 1 {
            self.changed.notify_waiters();
        }
    }

    /// Wait for the next item. Returns `None` once the queue is closed and every
    /// item has completed, or as soon as the queue is aborted.
    pub async fn pop(&self) -> Option<WorkItem> {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            // Register before checking state so a concurrent notify_waiters() is not missed.
            notified.as_mut().enable();

            if self.aborted.load(Ordering::SeqCst) {
                return None;
            }
            if let Some(item) = self.lock_items().pop_front() {
                return Some(item);
            }
            if self.closed.load(Ordering::SeqCst) && self.outstanding.load(Ordering::SeqCst) == 0 {
                return None;
            }

            notified.await;
        }
    }

    /// Items pushed and not yet completed
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Items waiting to be picked up
    pub fn pending(&self) -> usize {
        self.lock_items().len()
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}
