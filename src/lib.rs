//! # eventfan
//!
//! **Eventfan** is an in-process event buffering and fan-out library.
//!
//! It accepts events produced at arbitrary rates, retains them in a bounded
//! queue, collects demand declarations from concurrent subscribers, and
//! assigns buffered events to those subscribers under a pluggable fairness
//! policy. It is designed as a building block inside larger services that
//! need backpressure-aware, many-to-many event distribution with bounded
//! memory and explicit overload behavior.
//!
//! ## Features
//!
//! | Area            | Description                                                        | Key types / traits                        |
//! |-----------------|--------------------------------------------------------------------|-------------------------------------------|
//! | **Buffering**   | Bounded FIFO with drop-oldest/drop-newest overflow.                | [`BoundedQueue`], [`DropStrategy`]        |
//! | **Demand**      | Per-subscriber outstanding demand with an O(1) total.              | [`DemandMap`]                             |
//! | **Policies**    | Fairness policies deciding who gets how many events.               | [`AssignPolicy`], [`Even`], [`Greedy`]    |
//! | **Liveness**    | Epoch-token tracking of subscriber disappearance.                  | [`Watch`], [`LivenessTracker`]            |
//! | **Dispatching** | Actor dispatchers with immediate or batched delivery.              | [`Dispatcher`], [`BatchingDispatcher`]    |
//! | **Errors**      | Typed errors for subscription and lifecycle operations.            | [`DispatchError`]                         |
//!
//! ## Guarantees
//! - Per-subscriber FIFO: each subscriber sees a subsequence of the append
//!   order. No ordering across subscribers (assignment shuffles on purpose).
//! - Bounded memory: the queue is the only shared capacity; overflow drops
//!   are reported as counts, never raised as errors.
//! - Serial command processing: each dispatcher is a single actor; the
//!   delivery hook must be a non-blocking message send.
//!
//! ```no_run
//! use std::sync::Arc;
//! use eventfan::{Assigned, DispatchConfig, Dispatcher};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//!
//!     // Deliveries are handed to a non-blocking hook; here, a mailbox send.
//!     let hook = move |sub: &&'static str, batch: Assigned<String>| {
//!         let _ = tx.send((*sub, batch));
//!     };
//!     let dispatcher = Dispatcher::spawn(DispatchConfig::default(), Arc::new(hook));
//!
//!     dispatcher.ask("worker-1", 10).await?;
//!     let dropped = dispatcher.append(vec!["job".to_string()]).await?;
//!     assert_eq!(dropped, 0);
//!
//!     let (sub, batch) = rx.recv().await.expect("delivery");
//!     assert_eq!(sub, "worker-1");
//!     assert_eq!(batch.events, vec!["job".to_string()]);
//!
//!     dispatcher.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ---

mod buffer;
mod config;
mod dispatch;
mod error;
mod monitor;

// ---- Public re-exports ----

pub use buffer::{AssignPolicy, BoundedQueue, BufferStats, DemandMap, Even, EventBuffer, Greedy, Policy, Split};
pub use config::{BatchConfig, DispatchConfig, DropStrategy};
pub use dispatch::{Assigned, BatchingDispatcher, Deliver, Dispatcher, SourceId};
pub use error::DispatchError;
pub use monitor::{LivenessToken, LivenessTracker, MonitoredBuffer, Stats, TokenWatch, Watch};
