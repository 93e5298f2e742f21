//! End-to-end dispatcher scenarios: fairness, overflow, batching, liveness.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time;

use eventfan::{
    Assigned, BatchConfig, BatchingDispatcher, Deliver, DispatchConfig, Dispatcher, DropStrategy,
    LivenessToken, Watch,
};

type Sub = &'static str;
type Batch = (Sub, Assigned<u32>);

fn collecting_hook() -> (Arc<dyn Deliver<Sub, u32>>, mpsc::UnboundedReceiver<Batch>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let hook = move |sub: &Sub, batch: Assigned<u32>| {
        let _ = tx.send((*sub, batch));
    };
    (Arc::new(hook), rx)
}

/// Aggregates everything already delivered, per subscriber, in order.
fn drain(rx: &mut mpsc::UnboundedReceiver<Batch>) -> HashMap<Sub, Vec<u32>> {
    let mut by_sub: HashMap<Sub, Vec<u32>> = HashMap::new();
    while let Ok((sub, batch)) = rx.try_recv() {
        assert!(!batch.events.is_empty(), "empty deliveries must be suppressed");
        by_sub.entry(sub).or_default().extend(batch.events);
    }
    by_sub
}

/// Liveness mechanism that remembers issued tokens for manual down signals.
#[derive(Default)]
struct RecordingWatch {
    issued: Mutex<HashMap<Sub, LivenessToken>>,
}

impl RecordingWatch {
    fn token(&self, sub: Sub) -> LivenessToken {
        *self.issued.lock().unwrap().get(sub).unwrap()
    }
}

impl Watch<Sub> for RecordingWatch {
    fn watch(&self, sub: &Sub) -> LivenessToken {
        let token = LivenessToken::fresh();
        self.issued.lock().unwrap().insert(*sub, token);
        token
    }

    fn unwatch(&self, _sub: &Sub) {}
}

#[tokio::test]
async fn even_fairness_with_uneven_demands() {
    // Demands (10, 2, 3, 5) against 13 events: capped subscribers take their
    // whole demand, the others split the rest evenly.
    let (hook, mut rx) = collecting_hook();
    let d = Dispatcher::spawn(DispatchConfig::default(), hook);

    d.ask("s1", 10).await.unwrap();
    d.ask("s2", 2).await.unwrap();
    d.ask("s3", 3).await.unwrap();
    d.ask("s4", 5).await.unwrap();
    assert_eq!(d.append((0..13).collect()).await.unwrap(), 0);

    // stats() serializes behind the append's dispatch.
    let stats = d.stats().await.unwrap();
    assert_eq!(stats.buffered, 0);
    assert_eq!(stats.demand, 7);
    assert_eq!(stats.subscribed, 4);

    let by_sub = drain(&mut rx);
    assert_eq!(by_sub[&"s1"].len(), 4);
    assert_eq!(by_sub[&"s2"].len(), 2);
    assert_eq!(by_sub[&"s3"].len(), 3);
    assert_eq!(by_sub[&"s4"].len(), 4);

    // Each slice is a FIFO subsequence of the appended events.
    for events in by_sub.values() {
        assert!(events.windows(2).all(|w| w[0] < w[1]));
    }
    d.shutdown();
}

#[tokio::test]
async fn remainder_lands_on_exactly_one_subscriber() {
    // Four subscribers of 2 against 5 events: sum 5, exactly one gets 2.
    let subs: [Sub; 4] = ["a", "b", "c", "d"];
    let mut winners: HashMap<Sub, usize> = HashMap::new();

    for _ in 0..100 {
        let (hook, mut rx) = collecting_hook();
        let d = Dispatcher::spawn(DispatchConfig::default(), hook);
        for sub in subs {
            d.ask(sub, 2).await.unwrap();
        }
        d.append((0..5).collect()).await.unwrap();
        let stats = d.stats().await.unwrap();
        assert_eq!(stats.buffered, 0);
        assert_eq!(stats.demand, 3);

        let by_sub = drain(&mut rx);
        let total: usize = by_sub.values().map(Vec::len).sum();
        assert_eq!(total, 5);
        let twos: Vec<Sub> = subs
            .into_iter()
            .filter(|s| by_sub.get(s).map_or(0, Vec::len) == 2)
            .collect();
        assert_eq!(twos.len(), 1);
        *winners.entry(twos[0]).or_default() += 1;
        d.shutdown();
    }

    // The extra event must rotate across subscribers, not stick to one.
    assert!(winners.len() >= 2, "remainder never rotated: {winners:?}");
}

#[tokio::test]
async fn drop_oldest_overflow_delivers_survivors() {
    let mut config = DispatchConfig::default();
    config.capacity = 10;
    config.drop_strategy = DropStrategy::DropOldest;
    let (hook, mut rx) = collecting_hook();
    let d = Dispatcher::spawn(config, hook);

    assert_eq!(d.append((0..=10).collect()).await.unwrap(), 1);

    d.ask("a", 10).await.unwrap();
    let stats = d.stats().await.unwrap();
    assert_eq!(stats.buffered, 0);
    assert_eq!(stats.demand, 0);

    let by_sub = drain(&mut rx);
    assert_eq!(by_sub[&"a"], (1..=10).collect::<Vec<u32>>());
    d.shutdown();
}

#[tokio::test]
async fn fifo_preserved_across_appends() {
    let (hook, mut rx) = collecting_hook();
    let d = Dispatcher::spawn(DispatchConfig::default(), hook);

    d.ask("a", 100).await.unwrap();
    for chunk in [vec![0, 1], vec![2], vec![3, 4, 5]] {
        d.append(chunk).await.unwrap();
    }
    d.stats().await.unwrap();

    let by_sub = drain(&mut rx);
    assert_eq!(by_sub[&"a"], vec![0, 1, 2, 3, 4, 5]);
    d.shutdown();
}

#[tokio::test(start_paused = true)]
async fn batching_flushes_by_size() {
    let mut config = DispatchConfig::default();
    config.capacity = 10;
    let batch = BatchConfig {
        batch_size: 10,
        max_delay: Duration::from_secs(3600),
    };
    let (hook, mut rx) = collecting_hook();
    let d = BatchingDispatcher::spawn(config, batch, hook);

    d.ask("a", 1).await.unwrap();
    d.append(vec![0]).await.unwrap();

    let stats = d.stats().await.unwrap();
    assert_eq!(stats.buffered, 1);
    assert_eq!(stats.demand, 1);
    assert!(drain(&mut rx).is_empty());

    d.append((1..10).collect()).await.unwrap();
    let stats = d.stats().await.unwrap();
    assert_eq!(stats.buffered, 9);
    assert_eq!(stats.demand, 0);

    let by_sub = drain(&mut rx);
    assert_eq!(by_sub[&"a"], vec![0]);
    d.shutdown();
}

#[tokio::test(start_paused = true)]
async fn batching_flushes_by_timer() {
    let mut config = DispatchConfig::default();
    config.capacity = 10;
    let batch = BatchConfig {
        batch_size: 10,
        max_delay: Duration::from_millis(50),
    };
    let (hook, mut rx) = collecting_hook();
    let d = BatchingDispatcher::spawn(config, batch, hook);

    d.ask("a", 1).await.unwrap();
    d.append(vec![7]).await.unwrap();
    assert!(drain(&mut rx).is_empty());

    // Wait out the flush timer (paused clock, deterministic).
    time::sleep(Duration::from_millis(100)).await;

    let stats = d.stats().await.unwrap();
    assert_eq!(stats.buffered, 0);
    assert_eq!(stats.demand, 0);
    let by_sub = drain(&mut rx);
    assert_eq!(by_sub[&"a"], vec![7]);
    d.shutdown();
}

#[tokio::test]
async fn liveness_cleanup_withdraws_demand() {
    let watcher = Arc::new(RecordingWatch::default());
    let (hook, _rx) = collecting_hook();
    let d = Dispatcher::spawn_with_watch(
        DispatchConfig::default(),
        Arc::clone(&watcher) as Arc<dyn Watch<Sub>>,
        hook,
    );

    d.ask("s1", 3).await.unwrap();
    d.ask("s2", 7).await.unwrap();
    d.ask("s3", 13).await.unwrap();

    let stats = d.stats().await.unwrap();
    assert_eq!(stats.demand, 23);
    assert_eq!(stats.subscribed, 3);

    d.down("s2", watcher.token("s2")).await.unwrap();

    let stats = d.stats().await.unwrap();
    assert_eq!(stats.demand, 16);
    assert_eq!(stats.subscribed, 2);

    // The dead subscriber's slot is gone: later events go elsewhere.
    d.append((0..16).collect()).await.unwrap();
    let stats = d.stats().await.unwrap();
    assert_eq!(stats.demand, 0);
    assert_eq!(stats.buffered, 0);
    d.shutdown();
}

#[tokio::test]
async fn ask_after_down_re_registers_from_scratch() {
    let watcher = Arc::new(RecordingWatch::default());
    let (hook, mut rx) = collecting_hook();
    let d = Dispatcher::spawn_with_watch(
        DispatchConfig::default(),
        Arc::clone(&watcher) as Arc<dyn Watch<Sub>>,
        hook,
    );

    d.ask("a", 5).await.unwrap();
    let old_token = watcher.token("a");
    d.down("a", old_token).await.unwrap();
    assert_eq!(d.stats().await.unwrap().subscribed, 0);

    // Re-registration gets a fresh epoch; the stale token is now inert.
    d.ask("a", 2).await.unwrap();
    let new_token = watcher.token("a");
    assert_ne!(old_token, new_token);

    d.down("a", old_token).await.unwrap();
    let stats = d.stats().await.unwrap();
    assert_eq!(stats.subscribed, 1);
    assert_eq!(stats.demand, 2);

    d.append(vec![1, 2]).await.unwrap();
    d.stats().await.unwrap();
    let by_sub = drain(&mut rx);
    assert_eq!(by_sub[&"a"], vec![1, 2]);
    d.shutdown();
}

#[tokio::test]
async fn greedy_policy_fully_satisfies_a_subset() {
    let mut config = DispatchConfig::default();
    config.policy = eventfan::Policy::Greedy;
    let (hook, mut rx) = collecting_hook();
    let d = Dispatcher::spawn(config, hook);

    d.ask("a", 4).await.unwrap();
    d.ask("b", 4).await.unwrap();
    d.append((0..6).collect()).await.unwrap();
    d.stats().await.unwrap();

    let by_sub = drain(&mut rx);
    let mut counts: Vec<usize> = by_sub.values().map(Vec::len).collect();
    counts.sort_unstable();
    assert_eq!(counts, vec![2, 4]);
    d.shutdown();
}
