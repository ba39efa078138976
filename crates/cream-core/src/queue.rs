//! The bounded FIFO work queue handed accepted connections by the
//! acceptor thread and drained by the worker pool.
//!
//! Grounded on the slot-dispatch queue in the example pack's interpreter
//! pool (`available: Arc<(Mutex<VecDeque<_>>, Condvar)>`), generalized
//! from a fixed set of reusable slots to an unbounded FIFO of
//! one-shot work items, and on `examples/original_source/src/queue.c`'s
//! enqueue/dequeue/invalidate contract: enqueue never blocks on capacity
//! but fails on an invalidated queue, dequeue blocks until an item is
//! available or the queue is invalidated, and invalidation wakes every
//! blocked dequeuer.
//!
//! The source implementation pairs a mutex with a POSIX semaphore; `std`
//! has no portable semaphore, so a `Condvar` plays the same role here —
//! exactly the substitution the pool's slot queue already makes.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use crate::error::CreamError;

struct QueueState<T> {
    items: VecDeque<T>,
    invalid: bool,
}

/// A FIFO queue of work items shared between one producer (the acceptor)
/// and many consumers (worker threads).
pub struct Queue<T> {
    state: Mutex<QueueState<T>>,
    not_empty: Condvar,
}

impl<T> Queue<T> {
    /// An empty, valid queue.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                invalid: false,
            }),
            not_empty: Condvar::new(),
        }
    }

    /// Push `item` to the back. Never blocks on capacity. Fails with
    /// [`CreamError::InvalidArgument`] if the queue has been invalidated,
    /// mirroring the source's `enqueue`, which checks `self->invalid`
    /// under the lock and returns `false` rather than queuing the item.
    pub fn enqueue(&self, item: T) -> Result<(), CreamError> {
        let mut state = self.state.lock().unwrap();
        if state.invalid {
            return Err(CreamError::InvalidArgument(
                "queue is invalidated".to_string(),
            ));
        }
        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Block until an item is available or the queue is invalidated.
    /// Returns `None` only once invalidated and drained.
    pub fn dequeue(&self) -> Option<T> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            if state.invalid {
                return None;
            }
            state = self.not_empty.wait(state).unwrap();
        }
    }

    /// Drop every queued item, mark the queue invalid, and wake every
    /// blocked dequeuer so they can observe the invalidation and return.
    pub fn invalidate(&self) {
        let mut state = self.state.lock().unwrap();
        state.items.clear();
        state.invalid = true;
        drop(state);
        self.not_empty.notify_all();
    }

    /// Number of items currently queued (diagnostic only).
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}
