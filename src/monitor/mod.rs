//! Subscriber monitoring: liveness epochs and the monitored buffer.
//!
//! ## Files & responsibilities
//! - **liveness.rs**: epoch tokens, the pluggable [`Watch`] mechanism, and
//!   the tracker that validates disappearance signals.
//! - **buffer.rs**: [`MonitoredBuffer`], keeping demand and liveness in sync
//!   for the dispatchers.

mod buffer;
mod liveness;

pub use buffer::{MonitoredBuffer, Stats};
pub use liveness::{LivenessToken, LivenessTracker, TokenWatch, Watch};
