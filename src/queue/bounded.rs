use super::ring::Ring;
use crate::error::{Closed, Error, Result, TryDequeueError, TryEnqueueError};
use parking_lot::{Condvar, Mutex};
use std::fmt;

/// Lifecycle of a [`BoundedQueue`].
///
/// Transitions only move forward: `Open -> Draining -> Closed` or
/// `Open -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// Accepting and offering items.
    Open,
    /// Rejecting new items, still handing out buffered ones.
    Draining,
    /// Rejecting new items; dequeue fails once the buffer is empty.
    Closed,
}

struct Inner<T> {
    ring: Ring<T>,
    state: QueueState,
}

/// Fixed-capacity FIFO queue with blocking enqueue and dequeue.
///
/// `enqueue` parks while the queue is full and `dequeue` parks while it is
/// empty. Once the queue is closed, parked callers wake up and observe the
/// new state instead of blocking forever.
pub struct BoundedQueue<T> {
    inner: Mutex<Inner<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::config("queue capacity must be > 0"));
        }

        Ok(Self {
            inner: Mutex::new(Inner {
                ring: Ring::with_capacity(capacity),
                state: QueueState::Open,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
        })
    }

    /// Append `item` at the tail, waiting for a free slot if the queue is full.
    ///
    /// Fails immediately, handing the item back, once the queue is draining
    /// or closed.
    pub fn enqueue(&self, item: T) -> std::result::Result<(), Closed<T>> {
        let mut inner = self.inner.lock();
        let mut item = item;

        loop {
            if inner.state != QueueState::Open {
                return Err(Closed(item));
            }

            match inner.ring.push_back(item) {
                Ok(()) => break,
                Err(rejected) => {
                    item = rejected;
                    self.not_full.wait(&mut inner);
                }
            }
        }

        debug_assert!(inner.ring.len() <= self.capacity);
        drop(inner);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Like [`enqueue`](Self::enqueue) but never waits.
    pub fn try_enqueue(&self, item: T) -> std::result::Result<(), TryEnqueueError<T>> {
        let mut inner = self.inner.lock();

        if inner.state != QueueState::Open {
            return Err(TryEnqueueError::Closed(item));
        }

        inner.ring.push_back(item).map_err(TryEnqueueError::Full)?;
        drop(inner);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove the head item, waiting while the queue is empty and open.
    ///
    /// Buffered items are still handed out after `close()`; only an empty,
    /// closed queue fails.
    pub fn dequeue(&self) -> std::result::Result<T, Closed> {
        let mut inner = self.inner.lock();

        loop {
            if let Some(item) = inner.ring.pop_front() {
                self.after_pop(inner);
                return Ok(item);
            }

            match inner.state {
                QueueState::Open => self.not_empty.wait(&mut inner),
                QueueState::Draining => {
                    inner.state = QueueState::Closed;
                    drop(inner);
                    self.wake_all();
                    return Err(Closed(()));
                }
                QueueState::Closed => return Err(Closed(())),
            }
        }
    }

    /// Like [`dequeue`](Self::dequeue) but never waits.
    pub fn try_dequeue(&self) -> std::result::Result<T, TryDequeueError> {
        let mut inner = self.inner.lock();

        if let Some(item) = inner.ring.pop_front() {
            self.after_pop(inner);
            return Ok(item);
        }

        match inner.state {
            QueueState::Open => Err(TryDequeueError::Empty),
            QueueState::Draining => {
                inner.state = QueueState::Closed;
                drop(inner);
                self.wake_all();
                Err(TryDequeueError::Closed)
            }
            QueueState::Closed => Err(TryDequeueError::Closed),
        }
    }

    // a draining queue closes itself when its last item leaves
    fn after_pop(&self, mut inner: parking_lot::MutexGuard<'_, Inner<T>>) {
        if inner.state == QueueState::Draining && inner.ring.is_empty() {
            inner.state = QueueState::Closed;
            drop(inner);
            self.wake_all();
        } else {
            drop(inner);
            self.not_full.notify_one();
        }
    }

    /// Stop accepting items. Idempotent.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if inner.state == QueueState::Closed {
            return;
        }
        inner.state = QueueState::Closed;
        drop(inner);
        self.wake_all();
    }

    /// Stop accepting items but keep handing out buffered ones; the queue
    /// closes itself once they are gone. No-op unless the queue is open.
    pub fn drain(&self) {
        let mut inner = self.inner.lock();
        if inner.state != QueueState::Open {
            return;
        }
        inner.state = if inner.ring.is_empty() {
            QueueState::Closed
        } else {
            QueueState::Draining
        };
        drop(inner);
        self.wake_all();
    }

    /// Close the queue and remove every buffered item in one critical
    /// section, so no consumer can pick one up in between.
    pub fn close_and_take(&self) -> Vec<T> {
        let mut inner = self.inner.lock();
        inner.state = QueueState::Closed;
        let items = inner.ring.take_all();
        drop(inner);
        self.wake_all();
        items
    }

    fn wake_all(&self) {
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    /// Number of buffered items.
    ///
    /// Only a snapshot: other threads may change it as soon as the lock is
    /// released.
    pub fn len(&self) -> usize {
        self.inner.lock().ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().ring.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.inner.lock().ring.is_full()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn state(&self) -> QueueState {
        self.inner.lock().state
    }

    pub fn is_closed(&self) -> bool {
        self.state() == QueueState::Closed
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.capacity)
            .field("len", &inner.ring.len())
            .field("state", &inner.state)
            .finish()
    }
}
