//! Bounded, closable FIFO between two pipeline stages.
//!
//! A [`BoundedQueue`] connects exactly one producer side to one consumer side.
//! `push` blocks while the buffer is full, `pop` blocks while it is empty, and
//! both wake up when the queue is closed.
//!
//! # Close / drain protocol
//!
//! - `close()` is one-way and idempotent.
//! - After close, every push is rejected without blocking or inserting.
//! - Items already buffered at close time are still delivered; `pop` returns
//!   `None` only once the queue is both closed and empty. That `None` is the
//!   end-of-stream signal.
//!
//! There is no timeout on any wait. A consumer that never pops stalls its
//! producer indefinitely once the buffer is full; this is the backpressure
//! contract and the liveness caveat that comes with it.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// What happens to an item pushed after the queue has been closed.
///
/// Both policies refuse the item and report it; they differ in who ends up
/// owning the refused value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosePolicy {
    /// Hand the item back to the caller in [`PushError::Closed`].
    #[default]
    Reject,
    /// Drop the item inside the queue and return [`PushError::Discarded`].
    Discard,
}

/// Error returned by [`BoundedQueue::push`] once the queue is closed.
#[derive(PartialEq, Eq)]
pub enum PushError<T> {
    /// The queue is closed; the item is returned untouched.
    Closed(T),
    /// The queue is closed and was configured to drop refused items.
    Discarded,
}

impl<T> PushError<T> {
    /// Recover the refused item, if the policy handed it back.
    pub fn into_inner(self) -> Option<T> {
        match self {
            PushError::Closed(item) => Some(item),
            PushError::Discarded => None,
        }
    }
}

impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushError::Closed(_) => write!(f, "Closed(..)"),
            PushError::Discarded => write!(f, "Discarded"),
        }
    }
}

impl<T> fmt::Display for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushError::Closed(_) => write!(f, "push to a closed queue was rejected"),
            PushError::Discarded => write!(f, "push to a closed queue was discarded"),
        }
    }
}

impl<T> std::error::Error for PushError<T> {}

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
    high_water: usize,
}

/// Thread-safe, capacity-limited FIFO with an explicit close/drain protocol.
pub struct BoundedQueue<T> {
    name: String,
    capacity: usize,
    policy: ClosePolicy,
    state: Mutex<QueueState<T>>,
    /// Signalled when an item is pushed or the queue is closed.
    not_empty: Condvar,
    /// Signalled when an item is popped or the queue is closed.
    not_full: Condvar,
}

impl<T> BoundedQueue<T> {
    /// Create a queue with the default [`ClosePolicy::Reject`] policy.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self::with_policy(name, capacity, ClosePolicy::default())
    }

    /// Create a queue with an explicit close policy.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_policy(name: impl Into<String>, capacity: usize, policy: ClosePolicy) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        Self {
            name: name.into(),
            capacity,
            policy,
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                closed: false,
                high_water: 0,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    // Poisoning is ignored: the state is consistent between statements.
    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an item, blocking while the queue is full and open.
    ///
    /// Returns an error without blocking or inserting if the queue is closed,
    /// including when it is closed while this call is waiting for space.
    pub fn push(&self, item: T) -> Result<(), PushError<T>> {
        let mut state = self.lock();
        while state.items.len() >= self.capacity && !state.closed {
            state = self
                .not_full
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        if state.closed {
            drop(state);
            return match self.policy {
                ClosePolicy::Reject => Err(PushError::Closed(item)),
                ClosePolicy::Discard => Err(PushError::Discarded),
            };
        }

        state.items.push_back(item);
        state.high_water = state.high_water.max(state.items.len());
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove the head item, blocking while the queue is empty and open.
    ///
    /// Returns `None` only once the queue is closed and fully drained.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.lock();
        while state.items.is_empty() && !state.closed {
            state = self
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        let item = state.items.pop_front();
        drop(state);
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Close the queue and wake every blocked producer and consumer.
    pub fn close(&self) {
        let mut state = self.lock();
        if !state.closed {
            state.closed = true;
            tracing::trace!(queue = %self.name, buffered = state.items.len(), "queue closed");
        }
        drop(state);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Whether `close()` has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of buffered items. A snapshot for observation only.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> ClosePolicy {
        self.policy
    }

    /// Largest number of items ever buffered at once.
    pub fn high_water_mark(&self) -> usize {
        self.lock().high_water
    }

    /// Blocking iterator that pops until end-of-stream.
    pub fn iter(&self) -> QueueIter<'_, T> {
        QueueIter { queue: self }
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("BoundedQueue")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("policy", &self.policy)
            .field("len", &state.items.len())
            .field("closed", &state.closed)
            .finish()
    }
}

/// Iterator returned by [`BoundedQueue::iter`].
pub struct QueueIter<'a, T> {
    queue: &'a BoundedQueue<T>,
}

impl<T> Iterator for QueueIter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.queue.pop()
    }
}

/// Type-erased, read-only view of a queue for the progress monitor.
pub trait QueueGauge: Send + Sync {
    fn name(&self) -> &str;
    fn len(&self) -> usize;
    fn capacity(&self) -> usize;
    fn high_water_mark(&self) -> usize;
    fn is_closed(&self) -> bool;
}

impl<T: Send> QueueGauge for BoundedQueue<T> {
    fn name(&self) -> &str {
        BoundedQueue::name(self)
    }

    fn len(&self) -> usize {
        BoundedQueue::len(self)
    }

    fn capacity(&self) -> usize {
        BoundedQueue::capacity(self)
    }

    fn high_water_mark(&self) -> usize {
        BoundedQueue::high_water_mark(self)
    }

    fn is_closed(&self) -> bool {
        BoundedQueue::is_closed(self)
    }
}
