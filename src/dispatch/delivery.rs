//! # Delivery edge: how assigned events leave the dispatcher.
//!
//! The dispatchers never talk to subscribers directly. For every assignment
//! they call the [`Deliver`] hook with the subscriber handle and an
//! [`Assigned`] batch naming the originating dispatcher. In a concrete
//! integration the hook is a message send into the subscriber's mailbox;
//! it must not block the dispatcher actor.
//!
//! Empty batches are suppressed before the hook is ever invoked.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter backing [`SourceId::fresh`].
static SOURCE_SEQ: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier of the dispatcher a batch originated from.
///
/// Subscribers consuming several dispatchers can tell the streams apart
/// without holding a reference back to the dispatcher itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

impl SourceId {
    pub(crate) fn fresh() -> Self {
        Self(SOURCE_SEQ.fetch_add(1, Ordering::Relaxed))
    }
}

/// One delivered batch: the originating dispatcher and the events, in FIFO
/// order for this subscriber.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Assigned<E> {
    /// Dispatcher the batch came from.
    pub source: SourceId,
    /// Assigned events, oldest first. Never empty.
    pub events: Vec<E>,
}

/// Output hook invoked once per non-empty assignment.
///
/// ## Contract
/// - Must not block: hand the batch off (e.g. `try_send` into a mailbox)
///   and return.
/// - Panics are caught by the dispatcher and reported; they do not take the
///   actor down, but the batch is lost for that subscriber.
pub trait Deliver<S, E>: Send + Sync {
    /// Delivers one batch to one subscriber.
    fn deliver(&self, sub: &S, batch: Assigned<E>);
}

impl<S, E, F> Deliver<S, E> for F
where
    F: Fn(&S, Assigned<E>) + Send + Sync,
{
    fn deliver(&self, sub: &S, batch: Assigned<E>) {
        self(sub, batch)
    }
}

/// Invokes the hook with panic isolation.
pub(crate) fn deliver_guarded<S, E>(hook: &dyn Deliver<S, E>, sub: &S, batch: Assigned<E>) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| hook.deliver(sub, batch)));
    if let Err(panic_err) = result {
        eprintln!("[eventfan] delivery hook panicked: {panic_err:?}");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn source_ids_are_unique() {
        assert_ne!(SourceId::fresh(), SourceId::fresh());
    }

    #[test]
    fn closures_implement_deliver() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = Arc::clone(&seen);
        let hook = move |_sub: &&str, batch: Assigned<u32>| {
            seen2.fetch_add(batch.events.len(), Ordering::SeqCst);
        };
        hook.deliver(
            &"a",
            Assigned {
                source: SourceId::fresh(),
                events: vec![1, 2, 3],
            },
        );
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn panicking_hook_is_isolated() {
        let hook = |_sub: &&str, _batch: Assigned<u32>| panic!("boom");
        deliver_guarded(
            &hook,
            &"a",
            Assigned {
                source: SourceId::fresh(),
                events: vec![1],
            },
        );
    }
}
