//! # Bounded FIFO of pending events.
//!
//! [`BoundedQueue`] is the single shared capacity in the system. It holds at
//! most `capacity` events and resolves overflow with a [`DropStrategy`]:
//! either the oldest buffered events are evicted from the head, or the
//! incoming tail of the append is discarded. Drops are reported as a count,
//! never as an error; producers can feed the count into upstream
//! backpressure or metrics.

use std::collections::VecDeque;

use crate::config::DropStrategy;

/// Fixed-capacity FIFO with a configurable overflow drop strategy.
#[derive(Clone, Debug)]
pub struct BoundedQueue<E> {
    items: VecDeque<E>,
    capacity: usize,
    strategy: DropStrategy,
}

impl<E> BoundedQueue<E> {
    /// Creates an empty queue holding at most `capacity` events.
    ///
    /// `capacity` must be positive.
    #[must_use]
    pub fn new(capacity: usize, strategy: DropStrategy) -> Self {
        debug_assert!(capacity > 0, "queue capacity must be positive");
        Self {
            items: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            strategy,
        }
    }

    /// Appends events in order, dropping per the configured strategy when the
    /// total would exceed capacity. Returns the number of events discarded.
    pub fn append(&mut self, events: Vec<E>) -> usize {
        match self.strategy {
            DropStrategy::DropNewest => {
                let free = self.capacity - self.items.len();
                let dropped = events.len().saturating_sub(free);
                let mut events = events;
                events.truncate(free);
                self.items.extend(events);
                dropped
            }
            DropStrategy::DropOldest => {
                self.items.extend(events);
                let dropped = self.items.len().saturating_sub(self.capacity);
                self.items.drain(..dropped);
                dropped
            }
        }
    }

    /// Removes and returns the first `min(n, len)` events in FIFO order.
    pub fn split(&mut self, n: usize) -> Vec<E> {
        let take = n.min(self.items.len());
        self.items.drain(..take).collect()
    }

    /// Number of buffered events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if no events are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maximum number of events this queue will hold.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
