//! # Immediate dispatcher: assign and deliver on every change.
//!
//! [`Dispatcher`] is a long-lived actor around a
//! [`MonitoredBuffer`](crate::monitor::MonitoredBuffer). Commands arrive
//! through a bounded mailbox and are processed strictly in order; after
//! every `append` or `ask` the actor runs the assignment policy and pushes
//! the resulting batches through the delivery hook.
//!
//! ## Command surface
//! - `append(events)`: synchronous reply with the overflow drop count
//! - `ask(sub, n)`: fire-and-forget demand declaration
//! - `unsubscribe(sub)`: synchronous reply, `NotSubscribed` when unknown
//! - `stats()`: synchronous reply with occupancy counters
//! - `down(sub, token)`: fire-and-forget disappearance signal; stale
//!   tokens are ignored by the actor
//!
//! After every command either the buffer or the total demand is empty.
//!
//! Shutdown is by [`Dispatcher::shutdown`] (or dropping every handle);
//! buffered events are discarded, no drain is promised.

use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::config::DispatchConfig;
use crate::error::DispatchError;
use crate::monitor::{LivenessToken, MonitoredBuffer, Stats, TokenWatch, Watch};

use super::delivery::{deliver_guarded, Assigned, Deliver, SourceId};

enum Command<S, E> {
    Append {
        events: Vec<E>,
        reply: oneshot::Sender<usize>,
    },
    Ask {
        sub: S,
        n: usize,
    },
    Unsubscribe {
        sub: S,
        reply: oneshot::Sender<Result<(), DispatchError>>,
    },
    Stats {
        reply: oneshot::Sender<Stats>,
    },
    Down {
        sub: S,
        token: LivenessToken,
    },
}

/// Handle to a running immediate dispatcher actor.
///
/// Cheap to clone; the actor exits when `shutdown` is called or every
/// handle has been dropped.
pub struct Dispatcher<S, E> {
    tx: mpsc::Sender<Command<S, E>>,
    cancel: CancellationToken,
    source: SourceId,
}

impl<S, E> Clone for Dispatcher<S, E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            cancel: self.cancel.clone(),
            source: self.source,
        }
    }
}

impl<S, E> Dispatcher<S, E>
where
    S: Clone + Eq + Hash + Send + 'static,
    E: Send + 'static,
{
    /// Spawns a dispatcher with the default token-only liveness mechanism.
    #[must_use]
    pub fn spawn(config: DispatchConfig<S>, deliver: Arc<dyn Deliver<S, E>>) -> Self {
        Self::spawn_with_watch(config, Arc::new(TokenWatch), deliver)
    }

    /// Spawns a dispatcher wired to an external liveness mechanism.
    #[must_use]
    pub fn spawn_with_watch(
        config: DispatchConfig<S>,
        watcher: Arc<dyn Watch<S>>,
        deliver: Arc<dyn Deliver<S, E>>,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel(config.mailbox.max(1));
        let cancel = CancellationToken::new();
        let source = SourceId::fresh();

        let mut core = DispatcherCore {
            buffer: MonitoredBuffer::new(
                config.policy,
                config.capacity,
                config.drop_strategy,
                watcher,
            ),
            deliver,
            source,
        };

        let loop_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = loop_cancel.cancelled() => break,
                    cmd = rx.recv() => match cmd {
                        Some(cmd) => core.handle(cmd),
                        None => break,
                    }
                }
            }
        });

        Self { tx, cancel, source }
    }

    /// Appends events and waits for the overflow drop count.
    pub async fn append(&self, events: Vec<E>) -> Result<usize, DispatchError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Append { events, reply }).await?;
        rx.await.map_err(|_| DispatchError::Terminated)
    }

    /// Declares `n` more demand for the subscriber. Zero is an accepted
    /// no-op. Returns once the command is enqueued.
    pub async fn ask(&self, sub: S, n: usize) -> Result<(), DispatchError> {
        self.send(Command::Ask { sub, n }).await
    }

    /// Removes the subscriber and all of its demand.
    pub async fn unsubscribe(&self, sub: S) -> Result<(), DispatchError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Unsubscribe { sub, reply }).await?;
        rx.await.map_err(|_| DispatchError::Terminated)?
    }

    /// Occupancy counters: buffered events, watched subscribers, demand.
    pub async fn stats(&self) -> Result<Stats, DispatchError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stats { reply }).await?;
        rx.await.map_err(|_| DispatchError::Terminated)
    }

    /// Signals that the subscriber disappeared. Honored only when `token`
    /// matches the current epoch; otherwise silently ignored.
    pub async fn down(&self, sub: S, token: LivenessToken) -> Result<(), DispatchError> {
        self.send(Command::Down { sub, token }).await
    }

    /// Identifier carried in every [`Assigned`] batch from this dispatcher.
    #[must_use]
    pub fn source(&self) -> SourceId {
        self.source
    }

    /// Stops the actor. Buffered events are discarded.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    async fn send(&self, cmd: Command<S, E>) -> Result<(), DispatchError> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| DispatchError::Terminated)
    }
}

struct DispatcherCore<S, E> {
    buffer: MonitoredBuffer<S, E>,
    deliver: Arc<dyn Deliver<S, E>>,
    source: SourceId,
}

impl<S, E> DispatcherCore<S, E>
where
    S: Clone + Eq + Hash,
{
    fn handle(&mut self, cmd: Command<S, E>) {
        match cmd {
            Command::Append { events, reply } => {
                let dropped = self.buffer.append(events);
                let _ = reply.send(dropped);
                self.dispatch();
            }
            Command::Ask { sub, n } => {
                if n > 0 {
                    self.buffer.ask(sub, n);
                    self.dispatch();
                }
            }
            Command::Unsubscribe { sub, reply } => {
                let _ = reply.send(self.buffer.unsubscribe(&sub));
            }
            Command::Stats { reply } => {
                let _ = reply.send(self.buffer.stats());
            }
            Command::Down { sub, token } => {
                // Stale epochs and unknown handles are dropped on the floor.
                let _ = self.buffer.down(&sub, token);
            }
        }
    }

    fn dispatch(&mut self) {
        let mut rng = rand::rng();
        for (sub, events) in self.buffer.assign_events(&mut rng) {
            deliver_guarded(
                self.deliver.as_ref(),
                &sub,
                Assigned {
                    source: self.source,
                    events,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::DispatchConfig;
    use crate::dispatch::Assigned;

    use super::*;

    type Batch = (&'static str, Assigned<u32>);

    fn spawn_collecting(
        config: DispatchConfig<&'static str>,
    ) -> (Dispatcher<&'static str, u32>, mpsc::UnboundedReceiver<Batch>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let hook = move |sub: &&'static str, batch: Assigned<u32>| {
            let _ = tx.send((*sub, batch));
        };
        (Dispatcher::spawn(config, Arc::new(hook)), rx)
    }

    #[tokio::test]
    async fn append_then_ask_delivers_fifo() {
        let (d, mut rx) = spawn_collecting(DispatchConfig::default());

        assert_eq!(d.append(vec![1, 2, 3]).await.unwrap(), 0);
        d.ask("a", 2).await.unwrap();

        let (sub, batch) = rx.recv().await.unwrap();
        assert_eq!(sub, "a");
        assert_eq!(batch.events, vec![1, 2]);
        assert_eq!(batch.source, d.source());

        let stats = d.stats().await.unwrap();
        assert_eq!(stats.buffered, 1);
        assert_eq!(stats.demand, 0);
        d.shutdown();
    }

    #[tokio::test]
    async fn ask_before_append_receives_later_events() {
        let (d, mut rx) = spawn_collecting(DispatchConfig::default());

        d.ask("a", 5).await.unwrap();
        assert_eq!(d.append(vec![7, 8]).await.unwrap(), 0);

        let (_, batch) = rx.recv().await.unwrap();
        assert_eq!(batch.events, vec![7, 8]);

        let stats = d.stats().await.unwrap();
        assert_eq!(stats.buffered, 0);
        assert_eq!(stats.demand, 3);
        d.shutdown();
    }

    #[tokio::test]
    async fn either_demand_or_buffer_is_empty_after_each_command() {
        let (d, _rx) = spawn_collecting(DispatchConfig::default());

        d.ask("a", 3).await.unwrap();
        d.append(vec![1, 2, 3, 4, 5]).await.unwrap();
        let s = d.stats().await.unwrap();
        assert!(s.demand == 0 || s.buffered == 0);

        d.ask("b", 10).await.unwrap();
        let s = d.stats().await.unwrap();
        assert!(s.demand == 0 || s.buffered == 0);
        d.shutdown();
    }

    #[tokio::test]
    async fn append_reports_drops() {
        let mut config = DispatchConfig::default();
        config.capacity = 4;
        let (d, _rx) = spawn_collecting(config);

        assert_eq!(d.append(vec![0, 1, 2, 3, 4, 5]).await.unwrap(), 2);
        assert_eq!(d.stats().await.unwrap().buffered, 4);
        d.shutdown();
    }

    #[tokio::test]
    async fn unsubscribe_unknown_is_not_subscribed() {
        let (d, _rx) = spawn_collecting(DispatchConfig::default());
        assert_eq!(
            d.unsubscribe("ghost").await,
            Err(DispatchError::NotSubscribed)
        );
        d.shutdown();
    }

    #[tokio::test]
    async fn unsubscribe_withdraws_demand() {
        let (d, mut rx) = spawn_collecting(DispatchConfig::default());

        d.ask("a", 4).await.unwrap();
        d.unsubscribe("a").await.unwrap();
        assert_eq!(d.stats().await.unwrap().demand, 0);

        // Events appended afterwards stay buffered.
        d.append(vec![1]).await.unwrap();
        assert_eq!(d.stats().await.unwrap().buffered, 1);
        assert!(rx.try_recv().is_err());
        d.shutdown();
    }

    #[tokio::test]
    async fn commands_fail_after_shutdown() {
        let (d, _rx) = spawn_collecting(DispatchConfig::default());
        d.shutdown();
        // The actor drains on cancellation; sends race the loop exit, so
        // retry until the mailbox is observed closed.
        loop {
            match d.stats().await {
                Err(DispatchError::Terminated) => break,
                Ok(_) => tokio::task::yield_now().await,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
    }
}
