//! # Error types for dispatch operations.
//!
//! All fallible operations in this crate return [`DispatchError`]. Errors are
//! carried back to the caller as values; they are never panicked and never
//! cross the actor boundary as anything other than a reply payload.
//!
//! Overload is deliberately **not** an error: overflow drops are reported as
//! counts from `append`, and stale flush timers inside the batching
//! dispatcher are silently discarded.

use thiserror::Error;

/// Errors produced by buffer and dispatcher operations.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// The subscriber handle is not currently tracked.
    ///
    /// Returned when unsubscribing, or acknowledging the disappearance of,
    /// a handle that was never subscribed (or was already removed).
    #[error("subscriber is not subscribed")]
    NotSubscribed,

    /// A disappearance signal carried a liveness token from an earlier
    /// subscription epoch.
    ///
    /// This indicates the signal is stale and should be dropped; it is not
    /// a caller mistake. See [`LivenessTracker`](crate::monitor::LivenessTracker).
    #[error("liveness token does not match the current subscription epoch")]
    StaleToken,

    /// The dispatcher actor has shut down and no longer accepts commands.
    #[error("dispatcher has terminated")]
    Terminated,
}

impl DispatchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::NotSubscribed => "not_subscribed",
            DispatchError::StaleToken => "stale_token",
            DispatchError::Terminated => "terminated",
        }
    }
}
