//! # Event buffer: bounded queue wired to demand accounting.
//!
//! [`EventBuffer`] composes the bounded FIFO, the demand map, and an
//! assignment policy. Producers `append` events, subscribers `ask` for more,
//! and `assign_events` runs the policy to pay outstanding demand with
//! buffered events.
//!
//! ## Shape invariant
//! `assign_events` always drains one side or the other: afterwards either
//! the queue is empty or the total demand is zero. Mutating operations may
//! leave both sides positive temporarily; callers re-establish the shape by
//! calling `assign_events`.
//!
//! The buffer is a plain value with no internal synchronization; the
//! dispatchers confine one instance to a single actor.

use std::hash::Hash;

use rand::RngCore;

use crate::config::DropStrategy;

use super::demand::DemandMap;
use super::policy::{AssignPolicy, Policy};
use super::queue::BoundedQueue;

/// Occupancy counters reported by [`EventBuffer::stats`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferStats {
    /// Events currently buffered.
    pub buffered: usize,
    /// Total outstanding demand.
    pub demand: usize,
}

/// Bounded FIFO of events plus the demand that will consume them.
#[derive(Clone, Debug)]
pub struct EventBuffer<S, E> {
    queue: BoundedQueue<E>,
    demands: DemandMap<S>,
    policy: Policy<S>,
}

impl<S, E> EventBuffer<S, E>
where
    S: Clone + Eq + Hash,
{
    /// Creates an empty buffer.
    ///
    /// `capacity` must be positive.
    #[must_use]
    pub fn new(policy: Policy<S>, capacity: usize, strategy: DropStrategy) -> Self {
        Self {
            queue: BoundedQueue::new(capacity, strategy),
            demands: DemandMap::new(),
            policy,
        }
    }

    /// Appends events to the queue, returning the overflow drop count.
    pub fn append(&mut self, events: Vec<E>) -> usize {
        self.queue.append(events)
    }

    /// Records `n` more demand for the subscriber. Zero is a no-op.
    ///
    /// Does not trigger delivery; call [`assign_events`](Self::assign_events)
    /// afterwards.
    pub fn ask(&mut self, sub: S, n: usize) {
        self.demands.add(sub, n);
    }

    /// Withdraws all demand of the subscriber.
    pub fn remove_subscriber(&mut self, sub: &S) -> usize {
        self.demands.remove(sub)
    }

    /// Runs the policy and splits buffered events across demanders.
    ///
    /// Returns `(subscriber, events)` pairs in no meaningful cross-subscriber
    /// order; within each pair the events are in FIFO append order. Empty
    /// slices are omitted. With no events or no demand this is a no-op
    /// returning an empty list.
    pub fn assign_events(&mut self, rng: &mut dyn RngCore) -> Vec<(S, Vec<E>)> {
        if self.queue.is_empty() || self.demands.total() == 0 {
            return Vec::new();
        }

        let split = self.policy.assign(&self.demands, self.queue.len(), rng);
        debug_assert_eq!(
            split.assigned.total(),
            self.queue.len().min(self.demands.total())
        );
        self.demands = split.remaining;

        let mut out = Vec::with_capacity(split.assigned.len());
        for (sub, n) in split.assigned.iter() {
            let events = self.queue.split(n);
            if !events.is_empty() {
                out.push((sub.clone(), events));
            }
        }

        debug_assert!(self.queue.is_empty() || self.demands.total() == 0);
        out
    }

    /// Number of buffered events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True if no events are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Current demand of one subscriber.
    #[must_use]
    pub fn demand(&self, sub: &S) -> usize {
        self.demands.get(sub)
    }

    /// Occupancy counters: buffered events and outstanding demand.
    #[must_use]
    pub fn stats(&self) -> BufferStats {
        BufferStats {
            buffered: self.queue.len(),
            demand: self.demands.total(),
        }
    }
}
