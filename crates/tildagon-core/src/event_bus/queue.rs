//! FIFO delivery queue between producers and the dispatch loop.
//!
//! `push` never waits and ignores the capacity bound; it is the path used by
//! failure containment, which runs on the dispatch loop and must never wait
//! on itself. `push_wait` honours the bound and is where producers feel
//! backpressure.

use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;

/// Pending events waiting for dispatch
#[derive(Debug)]
pub struct DeliveryQueue<T> {
    items: Mutex<VecDeque<T>>,
    capacity: Option<usize>,
    readable: Notify,
    writable: Notify,
}

impl<T> DeliveryQueue<T> {
    /// Create a queue. `None` means unbounded.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            capacity,
            readable: Notify::new(),
            writable: Notify::new(),
        }
    }

    /// Append without waiting
    pub fn push(&self, item: T) {
        self.items.lock().push_back(item);
        self.readable.notify_one();
    }

    /// Append, waiting while a bounded queue is full
    pub async fn push_wait(&self, item: T) {
        let Some(capacity) = self.capacity else {
            self.push(item);
            return;
        };
        loop {
            let writable = self.writable.notified();
            {
                let mut items = self.items.lock();
                if items.len() < capacity {
                    items.push_back(item);
                    drop(items);
                    self.readable.notify_one();
                    return;
                }
            }
            writable.await;
        }
    }

    /// Take the oldest item, waiting until one is available
    pub async fn pop(&self) -> T {
        loop {
            let readable = self.readable.notified();
            if let Some(item) = self.try_pop() {
                return item;
            }
            readable.await;
        }
    }

    /// Take the oldest item if there is one
    pub fn try_pop(&self) -> Option<T> {
        let item = self.items.lock().pop_front();
        if item.is_some() {
            self.writable.notify_one();
        }
        item
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Configured bound, if any
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}
