//! Dispatchers: long-lived actors around a monitored buffer.
//!
//! Both dispatchers follow the same actor shape: a bounded command mailbox,
//! strictly serial processing, and a `CancellationToken` for shutdown. No
//! command blocks on external work while the actor state is held; the only
//! suspensions are waiting for the next command and, in the batching
//! dispatcher, the flush timer.
//!
//! ## Files & responsibilities
//! - **delivery.rs**: the [`Deliver`] output hook, [`Assigned`] batches, and
//!   [`SourceId`] tagging.
//! - **immediate.rs**: [`Dispatcher`]: assign and deliver on every append
//!   or demand change.
//! - **batching.rs**: [`BatchingDispatcher`]: defer assignment until a
//!   batch-size threshold or a maximum delay.

mod batching;
mod delivery;
mod immediate;

pub use batching::BatchingDispatcher;
pub use delivery::{Assigned, Deliver, SourceId};
pub use immediate::Dispatcher;
