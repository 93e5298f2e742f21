//! # Assignment policies: who gets how many events.
//!
//! A policy is a pure function from `(demands, event_count)` to a split of
//! the demand map into an *assigned* part and a *remaining* part. The split
//! is pointwise: for every subscriber, assigned + remaining equals the
//! original demand, and the assigned total is `min(total demand, events)`.
//!
//! Two policies ship with the crate:
//! - [`Even`] spreads events as evenly as the per-subscriber demand caps
//!   allow, distributing remainder events uniformly at random.
//! - [`Greedy`] satisfies subscribers whole, in a random order, until the
//!   events run out.
//!
//! Randomness is the only nondeterminism: policies never mutate their input,
//! and the caller supplies the RNG, so tests can seed it.
//!
//! ## Example
//! ```
//! use eventfan::{AssignPolicy, DemandMap, Even};
//!
//! let mut demands = DemandMap::new();
//! demands.add("a", 4);
//! demands.add("b", 4);
//!
//! let split = Even.assign(&demands, 6, &mut rand::rng());
//! assert_eq!(split.assigned.total(), 6);
//! assert_eq!(split.remaining.total(), 2);
//! ```

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::RngCore;

use super::demand::DemandMap;

/// Result of an assignment: the demand met by this round and what is left.
#[derive(Clone, Debug)]
pub struct Split<S> {
    /// Demand satisfied by the available events.
    pub assigned: DemandMap<S>,
    /// Demand still outstanding afterwards.
    pub remaining: DemandMap<S>,
}

/// Decides how many of `events` each demanding subscriber receives.
///
/// Implementations must uphold the split contract: pointwise
/// `assigned + remaining == demands`, and
/// `assigned.total() == min(demands.total(), events)`.
pub trait AssignPolicy<S>: Send + Sync {
    /// Splits `demands` against `events` available events.
    fn assign(&self, demands: &DemandMap<S>, events: usize, rng: &mut dyn RngCore) -> Split<S>;
}

/// Spreads events as evenly as demand caps allow.
///
/// Works in rounds: each round hands out `max(left / k, 1)` events per
/// subscriber (capped by their demand) over a fresh random permutation, so
/// leftover remainder events land on uniformly random subscribers.
#[derive(Clone, Copy, Debug, Default)]
pub struct Even;

impl<S> AssignPolicy<S> for Even
where
    S: Clone + Eq + Hash,
{
    fn assign(&self, demands: &DemandMap<S>, events: usize, rng: &mut dyn RngCore) -> Split<S> {
        if demands.total() <= events {
            return Split {
                assigned: demands.clone(),
                remaining: DemandMap::new(),
            };
        }

        let mut assigned = DemandMap::new();
        let mut remaining = demands.clone();
        let mut left = events;

        // remaining.total() > left holds throughout, so the map never runs
        // dry before the events do and every round makes progress.
        while left > 0 {
            let batch = (left / remaining.len()).max(1);
            let mut order = remaining.subscribers();
            order.shuffle(rng);

            for sub in order {
                if left == 0 {
                    break;
                }
                let amount = batch.min(remaining.get(&sub)).min(left);
                remaining.subtract(&sub, amount);
                assigned.add(sub, amount);
                left -= amount;
            }
        }

        Split {
            assigned,
            remaining,
        }
    }
}

/// Hands full demand to a randomly ordered subset of subscribers.
///
/// At most one subscriber ends up partially satisfied: the one holding the
/// position where the events ran out.
#[derive(Clone, Copy, Debug, Default)]
pub struct Greedy;

impl<S> AssignPolicy<S> for Greedy
where
    S: Clone + Eq + Hash,
{
    fn assign(&self, demands: &DemandMap<S>, events: usize, rng: &mut dyn RngCore) -> Split<S> {
        let mut assigned = DemandMap::new();
        let mut remaining = demands.clone();
        let mut left = events;

        let mut order = demands.subscribers();
        order.shuffle(rng);

        for sub in order {
            if left == 0 {
                break;
            }
            let amount = remaining.get(&sub).min(left);
            remaining.subtract(&sub, amount);
            assigned.add(sub, amount);
            left -= amount;
        }

        Split {
            assigned,
            remaining,
        }
    }
}

/// Policy selector carried in the dispatcher configuration.
pub enum Policy<S> {
    /// Spread events evenly across demanders ([`Even`]).
    Even,
    /// Fully satisfy an arbitrarily ordered subset ([`Greedy`]).
    Greedy,
    /// A user-supplied policy.
    Custom(Arc<dyn AssignPolicy<S>>),
}

impl<S> Default for Policy<S> {
    /// [`Policy::Even`].
    fn default() -> Self {
        Policy::Even
    }
}

impl<S> Clone for Policy<S> {
    fn clone(&self) -> Self {
        match self {
            Policy::Even => Policy::Even,
            Policy::Greedy => Policy::Greedy,
            Policy::Custom(p) => Policy::Custom(Arc::clone(p)),
        }
    }
}

impl<S> fmt::Debug for Policy<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Even => f.write_str("Even"),
            Policy::Greedy => f.write_str("Greedy"),
            Policy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl<S> AssignPolicy<S> for Policy<S>
where
    S: Clone + Eq + Hash,
{
    fn assign(&self, demands: &DemandMap<S>, events: usize, rng: &mut dyn RngCore) -> Split<S> {
        match self {
            Policy::Even => Even.assign(demands, events, rng),
            Policy::Greedy => Greedy.assign(demands, events, rng),
            Policy::Custom(policy) => policy.assign(demands, events, rng),
        }
    }
}
