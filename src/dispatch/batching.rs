//! # Batching dispatcher: accumulate, then flush.
//!
//! [`BatchingDispatcher`] has the same command surface as the immediate
//! [`Dispatcher`](crate::dispatch::Dispatcher) but defers assignment until a
//! batch is worth delivering: either the buffer reaches `batch_size`, or
//! `max_delay` elapses since the first unflushed change.
//!
//! ## Flush scheduling
//! On every `append` or `ask` the actor checks, in order:
//! 1. buffer at or past `batch_size` → flush now, forget any pending timer;
//! 2. a deferred flush is already pending → nothing to do;
//! 3. otherwise mint a fresh flush token and arm a timer that sends
//!    `(flush, token)` back into the mailbox after `max_delay`.
//!
//! A timer firing with a token that no longer matches the pending one is a
//! leftover from a superseded schedule and is dropped silently. The token
//! comparison gives at-most-one in-flight deferred flush without ever
//! cancelling timers.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::{BatchConfig, DispatchConfig};
use crate::error::DispatchError;
use crate::monitor::{LivenessToken, MonitoredBuffer, Stats, TokenWatch, Watch};

use super::delivery::{deliver_guarded, Assigned, Deliver, SourceId};

/// Identifies one scheduled deferred flush.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FlushToken(u64);

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
    Flush(FlushToken),
}

/// Handle to a running batching dispatcher actor.
///
/// Cheap to clone; the actor exits when `shutdown` is called or every
/// handle has been dropped. Timers hold only weak mailbox references, so a
/// pending flush never keeps a dead dispatcher alive.
pub struct BatchingDispatcher<S, E> {
    tx: mpsc::Sender<Command<S, E>>,
    cancel: CancellationToken,
    source: SourceId,
}

impl<S, E> Clone for BatchingDispatcher<S, E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            cancel: self.cancel.clone(),
            source: self.source,
        }
    }
}

impl<S, E> BatchingDispatcher<S, E>
where
    S: Clone + Eq + Hash + Send + 'static,
    E: Send + 'static,
{
    /// Spawns a batching dispatcher with the default token-only liveness
    /// mechanism.
    #[must_use]
    pub fn spawn(
        config: DispatchConfig<S>,
        batch: BatchConfig,
        deliver: Arc<dyn Deliver<S, E>>,
    ) -> Self {
        Self::spawn_with_watch(config, batch, Arc::new(TokenWatch), deliver)
    }

    /// Spawns a batching dispatcher wired to an external liveness mechanism.
    #[must_use]
    pub fn spawn_with_watch(
        config: DispatchConfig<S>,
        batch: BatchConfig,
        watcher: Arc<dyn Watch<S>>,
        deliver: Arc<dyn Deliver<S, E>>,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel(config.mailbox.max(1));
        let cancel = CancellationToken::new();
        let source = SourceId::fresh();

        let mut core = BatchingCore {
            buffer: MonitoredBuffer::new(
                config.policy,
                config.capacity,
                config.drop_strategy,
                watcher,
            ),
            deliver,
            source,
            batch_size: batch.batch_size.max(1),
            max_delay: batch.max_delay,
            pending: None,
            flush_seq: 0,
            mailbox: tx.downgrade(),
            cancel: cancel.clone(),
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
    ///
    /// Delivery happens on the next flush, not in this call.
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

    /// Stops the actor. Buffered events are discarded; no drain is promised.
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

struct BatchingCore<S, E> {
    buffer: MonitoredBuffer<S, E>,
    deliver: Arc<dyn Deliver<S, E>>,
    source: SourceId,
    batch_size: usize,
    max_delay: Duration,
    /// Token of the in-flight deferred flush, if one is scheduled.
    pending: Option<FlushToken>,
    flush_seq: u64,
    mailbox: mpsc::WeakSender<Command<S, E>>,
    cancel: CancellationToken,
}

impl<S, E> BatchingCore<S, E>
where
    S: Clone + Eq + Hash + Send + 'static,
    E: Send + 'static,
{
    fn handle(&mut self, cmd: Command<S, E>) {
        match cmd {
            Command::Append { events, reply } => {
                let dropped = self.buffer.append(events);
                let _ = reply.send(dropped);
                self.schedule_flush();
            }
            Command::Ask { sub, n } => {
                if n > 0 {
                    self.buffer.ask(sub, n);
                    self.schedule_flush();
                }
            }
            Command::Unsubscribe { sub, reply } => {
                let _ = reply.send(self.buffer.unsubscribe(&sub));
            }
            Command::Stats { reply } => {
                let _ = reply.send(self.buffer.stats());
            }
            Command::Down { sub, token } => {
                let _ = self.buffer.down(&sub, token);
            }
            Command::Flush(token) => {
                if self.pending == Some(token) {
                    self.pending = None;
                    self.flush();
                }
                // Anything else is a timer from a superseded schedule.
            }
        }
    }

    fn schedule_flush(&mut self) {
        if self.buffer.stats().buffered >= self.batch_size {
            self.pending = None;
            self.flush();
            return;
        }
        if self.pending.is_some() {
            return;
        }

        self.flush_seq = self.flush_seq.wrapping_add(1);
        let token = FlushToken(self.flush_seq);
        self.pending = Some(token);

        let mailbox = self.mailbox.clone();
        let cancel = self.cancel.clone();
        let delay = self.max_delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                () = time::sleep(delay) => {
                    if let Some(tx) = mailbox.upgrade() {
                        let _ = tx.send(Command::Flush(token)).await;
                    }
                }
            }
        });
    }

    fn flush(&mut self) {
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
