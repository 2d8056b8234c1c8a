//! Bounded MPMC ring buffer (spec §4.3).
//!
//! `enqueue` never blocks the producer: the storage engine's write path
//! cannot tolerate backpressure from the backup subsystem (spec §4.5), so a
//! full queue simply rejects the item with [`EnqueueError::Full`]. `dequeue`
//! blocks with a timeout, waking on enqueue or on [`RingBuffer::shutdown`].

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    #[error("ring buffer is full")]
    Full,
    #[error("ring buffer has been shut down")]
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DequeueError {
    Timeout,
    Shutdown,
}

struct Inner<T> {
    items: VecDeque<T>,
    capacity: usize,
    shutdown: bool,
}

/// Bounded queue of fixed capacity `C`, safe for multiple concurrent
/// producers and consumers.
pub struct RingBuffer<T> {
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        RingBuffer {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                capacity,
                shutdown: false,
            }),
            not_empty: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Non-blocking enqueue. FIFO within a single caller's sequence of
    /// calls; no ordering guarantee across concurrent producers.
    pub fn enqueue(&self, item: T) -> Result<(), EnqueueError> {
        let mut guard = self.inner.lock();
        if guard.shutdown {
            return Err(EnqueueError::Shutdown);
        }
        if guard.items.len() >= guard.capacity {
            return Err(EnqueueError::Full);
        }
        guard.items.push_back(item);
        drop(guard);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Blocking dequeue with a per-call timeout. Wakes on enqueue or on
    /// `shutdown`.
    pub fn dequeue(&self, timeout: Duration) -> Result<T, DequeueError> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.inner.lock();
        loop {
            if let Some(item) = guard.items.pop_front() {
                return Ok(item);
            }
            if guard.shutdown {
                return Err(DequeueError::Shutdown);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(DequeueError::Timeout);
            }
            let remaining = deadline - now;
            let timed_out = self.not_empty.wait_for(&mut guard, remaining).timed_out();
            if timed_out && guard.items.is_empty() && !guard.shutdown {
                return Err(DequeueError::Timeout);
            }
        }
    }

    /// Signal shutdown: every blocked and future `dequeue` returns
    /// `Shutdown`; every future `enqueue` returns `Shutdown`.
    pub fn shutdown(&self) {
        let mut guard = self.inner.lock();
        guard.shutdown = true;
        drop(guard);
        self.not_empty.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.lock().shutdown
    }
}
