//! # Monitored buffer: demand plus liveness, kept in sync.
//!
//! [`MonitoredBuffer`] wraps the [`EventBuffer`](crate::buffer::EventBuffer)
//! and a [`LivenessTracker`], maintaining one invariant: every subscriber
//! with positive demand is watched. The reverse does not hold: a subscriber
//! whose demand was fully paid down stays watched, so a later `ask` picks up
//! the existing epoch instead of re-registering.

use std::hash::Hash;
use std::sync::Arc;

use rand::RngCore;

use crate::buffer::{EventBuffer, Policy};
use crate::config::DropStrategy;
use crate::error::DispatchError;

use super::liveness::{LivenessToken, LivenessTracker, Watch};

/// Occupancy counters reported by [`MonitoredBuffer::stats`] and the
/// dispatchers' `stats` command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stats {
    /// Events currently buffered.
    pub buffered: usize,
    /// Subscribers currently watched.
    pub subscribed: usize,
    /// Total outstanding demand.
    pub demand: usize,
}

/// Event buffer with a liveness tracker riding along.
pub struct MonitoredBuffer<S, E> {
    buffer: EventBuffer<S, E>,
    liveness: LivenessTracker<S>,
}

impl<S, E> MonitoredBuffer<S, E>
where
    S: Clone + Eq + Hash,
{
    /// Creates an empty monitored buffer.
    #[must_use]
    pub fn new(
        policy: Policy<S>,
        capacity: usize,
        strategy: DropStrategy,
        watcher: Arc<dyn Watch<S>>,
    ) -> Self {
        Self {
            buffer: EventBuffer::new(policy, capacity, strategy),
            liveness: LivenessTracker::new(watcher),
        }
    }

    /// Appends events, returning the overflow drop count.
    pub fn append(&mut self, events: Vec<E>) -> usize {
        self.buffer.append(events)
    }

    /// Records demand and ensures the subscriber is watched.
    ///
    /// A zero `n` is a full no-op: no demand recorded, no watch created.
    pub fn ask(&mut self, sub: S, n: usize) {
        if n == 0 {
            return;
        }
        self.liveness.watch(&sub);
        self.buffer.ask(sub, n);
    }

    /// Unwatches the subscriber and withdraws all of its demand.
    pub fn unsubscribe(&mut self, sub: &S) -> Result<(), DispatchError> {
        self.liveness.unwatch(sub)?;
        self.buffer.remove_subscriber(sub);
        Ok(())
    }

    /// Handles a disappearance signal: on token match, the subscriber and
    /// its demand are removed. Mismatches leave everything untouched.
    pub fn down(&mut self, sub: &S, token: LivenessToken) -> Result<(), DispatchError> {
        self.liveness.on_down(sub, token)?;
        self.buffer.remove_subscriber(sub);
        Ok(())
    }

    /// Runs the assignment policy; see
    /// [`EventBuffer::assign_events`](crate::buffer::EventBuffer::assign_events).
    pub fn assign_events(&mut self, rng: &mut dyn RngCore) -> Vec<(S, Vec<E>)> {
        self.buffer.assign_events(rng)
    }

    /// Currently stored liveness token for the subscriber, if watched.
    #[must_use]
    pub fn token(&self, sub: &S) -> Option<LivenessToken> {
        self.liveness.token(sub)
    }

    /// Occupancy counters: buffered events, watched subscribers, demand.
    #[must_use]
    pub fn stats(&self) -> Stats {
        let inner = self.buffer.stats();
        Stats {
            buffered: inner.buffered,
            subscribed: self.liveness.len(),
            demand: inner.demand,
        }
    }
}
