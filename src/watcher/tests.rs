//! Tests for state tracking and the watcher registry.
use super::*;
use async_trait::async_trait;
use std::{collections::VecDeque, sync::Mutex};

use ConnectivityState::{Connecting, Ready, TransientFailure};

/// A channel that replays a fixed list of states, one per poll, and then
/// keeps reporting the last one.
#[derive(Debug)]
struct ScriptedChannel {
    script: Mutex<VecDeque<ConnectivityState>>,
    last: Mutex<ConnectivityState>,
    polls: AtomicUsize,
}

impl ScriptedChannel {
    fn new(states: &[ConnectivityState]) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(states.iter().copied().collect()),
            last: Mutex::new(ConnectivityState::Idle),
            polls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl RpcChannel for ScriptedChannel {
    fn target(&self) -> &str {
        "scripted:0"
    }

    fn state(&self) -> ConnectivityState {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            *last = next;
        }
        *last
    }

    async fn close(&self) -> Result<()> {
        Err(Error::AlreadyClosed)
    }
}

#[test]
fn test_tracker_reports_baseline_then_changes_only() {
    let mut tracker = StateTracker::default();
    let observations: Vec<_> = [Ready, Ready, TransientFailure, TransientFailure, Ready]
        .into_iter()
        .map(|state| tracker.observe(state))
        .collect();

    assert_eq!(
        observations,
        vec![
            Observation::Baseline(Ready),
            Observation::Unchanged,
            Observation::Transition { from: Ready, to: TransientFailure },
            Observation::Unchanged,
            Observation::Transition { from: TransientFailure, to: Ready },
        ]
    );
    assert_eq!(tracker.last(), Some(Ready));
}

#[tokio::test(start_paused = true)]
async fn test_watcher_logs_two_transitions_for_flapping_script() {
    let registry = WatcherRegistry::new();
    let channel = ScriptedChannel::new(&[Ready, Ready, TransientFailure, TransientFailure, Ready]);
    let mut observed = registry
        .spawn("matcher", channel.clone(), Duration::from_millis(50))
        .unwrap();

    // Five ticks: t = 0, 50, 100, 150, 200.
    tokio::time::sleep(Duration::from_millis(230)).await;
    assert!(channel.polls.load(Ordering::SeqCst) >= 5);
    assert_eq!(*observed.borrow_and_update(), Ready);

    let transitions = registry.cancel("matcher").await;
    assert_eq!(transitions, Some(2));
    assert!(registry.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_watcher_is_quiet_without_changes() {
    let registry = WatcherRegistry::new();
    let channel = ScriptedChannel::new(&[Connecting]);
    registry
        .spawn("accounts", channel.clone(), Duration::from_millis(50))
        .unwrap();

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(channel.polls.load(Ordering::SeqCst) > 30);
    assert_eq!(registry.cancel_all().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_observed_state_follows_channel() {
    let registry = WatcherRegistry::new();
    let channel = ScriptedChannel::new(&[Connecting, TransientFailure]);
    let mut observed = registry
        .spawn("matcher", channel, Duration::from_millis(100))
        .unwrap();

    observed.changed().await.unwrap();
    assert_eq!(*observed.borrow_and_update(), Connecting);
    observed.changed().await.unwrap();
    assert_eq!(*observed.borrow_and_update(), TransientFailure);

    registry.cancel_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_cancel_all_stops_every_watcher() {
    let registry = WatcherRegistry::new();
    for name in ["a", "b", "c"] {
        registry
            .spawn(name, ScriptedChannel::new(&[Ready]), Duration::from_millis(50))
            .unwrap();
    }
    assert_eq!(registry.len(), 3);
    assert_eq!(registry.spawned(), 3);

    registry.cancel_all().await;
    assert!(registry.is_empty());
    assert_eq!(registry.spawned(), 3);
    assert_eq!(registry.cancel("a").await, None);
}

#[tokio::test(start_paused = true)]
async fn test_spawn_rejects_a_name_already_watched() {
    let registry = WatcherRegistry::new();
    let first = ScriptedChannel::new(&[Ready]);
    let mut observed = registry
        .spawn("matcher", first.clone(), Duration::from_millis(50))
        .unwrap();

    let second = ScriptedChannel::new(&[TransientFailure]);
    let err = registry
        .spawn("matcher", second.clone(), Duration::from_millis(50))
        .unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.spawned(), 1);

    // The original watcher keeps running and the rejected channel is never polled.
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(*observed.borrow_and_update(), Ready);
    assert_eq!(second.polls.load(Ordering::SeqCst), 0);

    assert_eq!(registry.cancel("matcher").await, Some(0));
}
