//! # Liveness tracking with epoch tokens.
//!
//! [`LivenessTracker`] remembers, per subscriber, the token issued when the
//! subscriber was first watched. A disappearance signal is honored only when
//! it carries the currently stored token.
//!
//! ## Why tokens
//! If a subscriber goes away and the same handle value later re-subscribes,
//! an in-flight stale disappearance signal must not tear down the new epoch.
//! Re-watching mints a fresh token, so the stale signal fails the comparison
//! and is rejected with [`DispatchError::StaleToken`].
//!
//! ## Pluggable mechanism
//! The tracker does not assume any specific liveness transport. The
//! [`Watch`] trait is the integration seam: process supervision, connection
//! keepalives, health checks, or manual signals in tests. Whatever the
//! mechanism, it must eventually hand `(subscriber, token)` back to the
//! dispatcher's `down` entry point.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::DispatchError;

/// Global epoch counter backing [`LivenessToken::fresh`].
static TOKEN_SEQ: AtomicU64 = AtomicU64::new(1);

/// Opaque value identifying one subscription epoch of one subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LivenessToken(u64);

impl LivenessToken {
    /// Mints a process-wide unique token.
    #[must_use]
    pub fn fresh() -> Self {
        Self(TOKEN_SEQ.fetch_add(1, Ordering::Relaxed))
    }
}

/// Liveness mechanism consumed by the tracker.
///
/// `watch` is called once per subscription epoch and must return a fresh
/// token; `unwatch` tells the mechanism the subscriber is no longer of
/// interest. Implementations must not block: both are invoked from inside
/// the dispatcher actor.
pub trait Watch<S>: Send + Sync {
    /// Registers interest in the subscriber and returns its epoch token.
    fn watch(&self, sub: &S) -> LivenessToken;

    /// Drops interest in the subscriber.
    fn unwatch(&self, sub: &S);
}

/// Default [`Watch`] backed by the global token counter.
///
/// Issues fresh tokens and registers nothing. Suitable when no external
/// liveness signal exists, and for tests that drive `down` manually through
/// their own bookkeeping of issued tokens.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokenWatch;

impl<S> Watch<S> for TokenWatch {
    fn watch(&self, _sub: &S) -> LivenessToken {
        LivenessToken::fresh()
    }

    fn unwatch(&self, _sub: &S) {}
}

/// Maps subscriber handles to their current epoch token.
pub struct LivenessTracker<S> {
    watches: HashMap<S, LivenessToken>,
    watcher: Arc<dyn Watch<S>>,
}

impl<S> LivenessTracker<S>
where
    S: Clone + Eq + Hash,
{
    /// Creates an empty tracker driven by the given mechanism.
    #[must_use]
    pub fn new(watcher: Arc<dyn Watch<S>>) -> Self {
        Self {
            watches: HashMap::new(),
            watcher,
        }
    }

    /// Starts watching the subscriber. Idempotent: an already-watched
    /// subscriber keeps its current token.
    pub fn watch(&mut self, sub: &S) {
        if !self.watches.contains_key(sub) {
            let token = self.watcher.watch(sub);
            self.watches.insert(sub.clone(), token);
        }
    }

    /// Stops watching the subscriber.
    ///
    /// Any disappearance signal still in flight for the old epoch will be
    /// rejected afterwards with [`DispatchError::NotSubscribed`].
    pub fn unwatch(&mut self, sub: &S) -> Result<(), DispatchError> {
        match self.watches.remove(sub) {
            Some(_) => {
                self.watcher.unwatch(sub);
                Ok(())
            }
            None => Err(DispatchError::NotSubscribed),
        }
    }

    /// Acknowledges a disappearance signal.
    ///
    /// Accepts and removes the watch only when `token` matches the stored
    /// epoch; otherwise the signal is stale ([`DispatchError::StaleToken`])
    /// or the subscriber is unknown ([`DispatchError::NotSubscribed`]).
    pub fn on_down(&mut self, sub: &S, token: LivenessToken) -> Result<(), DispatchError> {
        match self.watches.get(sub) {
            None => Err(DispatchError::NotSubscribed),
            Some(current) if *current != token => Err(DispatchError::StaleToken),
            Some(_) => {
                self.watches.remove(sub);
                Ok(())
            }
        }
    }

    /// Currently stored token for the subscriber, if watched.
    #[must_use]
    pub fn token(&self, sub: &S) -> Option<LivenessToken> {
        self.watches.get(sub).copied()
    }

    /// True if the subscriber is currently watched.
    #[must_use]
    pub fn contains(&self, sub: &S) -> bool {
        self.watches.contains_key(sub)
    }

    /// Number of watched subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.watches.len()
    }

    /// True if nothing is watched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }
}
