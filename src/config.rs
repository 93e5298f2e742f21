//! # Dispatcher configuration.
//!
//! [`DispatchConfig`] defines the buffering behavior shared by both
//! dispatchers: queue capacity, overflow drop strategy, fairness policy, and
//! actor mailbox size. [`BatchConfig`] adds the two knobs specific to the
//! batching dispatcher: minimum batch size and maximum hold delay.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use eventfan::{BatchConfig, DispatchConfig, DropStrategy, Policy};
//!
//! let mut cfg: DispatchConfig<&'static str> = DispatchConfig::default();
//! cfg.capacity = 256;
//! cfg.drop_strategy = DropStrategy::DropNewest;
//! cfg.policy = Policy::Greedy;
//!
//! let batch = BatchConfig {
//!     batch_size: 10,
//!     max_delay: Duration::from_millis(50),
//! };
//! assert_eq!(batch.batch_size, 10);
//! ```

use std::time::Duration;

use crate::buffer::Policy;

/// Which events are discarded when an append overflows the buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DropStrategy {
    /// Evict buffered events from the head (oldest first).
    #[default]
    DropOldest,
    /// Discard incoming events from the tail of the append.
    DropNewest,
}

/// Configuration shared by both dispatchers.
///
/// Controls buffer capacity, overflow behavior, the fairness policy used at
/// assignment time, and the dispatcher's mailbox size.
#[derive(Clone, Debug)]
pub struct DispatchConfig<S> {
    /// Maximum number of events buffered before drops (must be positive).
    pub capacity: usize,
    /// Which events are dropped on overflow.
    pub drop_strategy: DropStrategy,
    /// Fairness policy used when assigning buffered events to demand.
    pub policy: Policy<S>,
    /// Capacity of the dispatcher's command mailbox.
    pub mailbox: usize,
}

impl<S> Default for DispatchConfig<S> {
    /// Provides a default configuration:
    /// - `capacity = 1024`
    /// - `drop_strategy = DropOldest`
    /// - `policy = Policy::Even`
    /// - `mailbox = 1024`
    fn default() -> Self {
        Self {
            capacity: 1024,
            drop_strategy: DropStrategy::default(),
            policy: Policy::default(),
            mailbox: 1024,
        }
    }
}

/// Batching knobs for the [`BatchingDispatcher`](crate::BatchingDispatcher).
#[derive(Clone, Copy, Debug)]
pub struct BatchConfig {
    /// Minimum buffered events that trigger an eager flush (must be >= 1).
    pub batch_size: usize,
    /// Maximum time events may sit in the buffer before a flush (must be > 0).
    pub max_delay: Duration,
}

impl Default for BatchConfig {
    /// Provides a default configuration:
    /// - `batch_size = 32`
    /// - `max_delay = 100ms`
    fn default() -> Self {
        Self {
            batch_size: 32,
            max_delay: Duration::from_millis(100),
        }
    }
}
