//! 连接状态观察器。
//! Connectivity state watchers.
//!
//! Every managed connection has exactly one watcher task. It polls the
//! channel at a fixed cadence and logs only when the state changes. A
//! watcher never tries to repair its connection; recovery belongs to the
//! channel's own backoff.

use crate::{
    channel::{ConnectivityState, RpcChannel},
    error::{Error, Result},
};
use dashmap::{DashMap, mapref::entry::Entry};
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What a single poll revealed.
/// 单次轮询的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// The first state ever observed.
    /// 观察到的第一个状态。
    Baseline(ConnectivityState),
    /// The state differs from the last recorded one.
    /// 状态与上次记录的不同。
    Transition {
        from: ConnectivityState,
        to: ConnectivityState,
    },
    Unchanged,
}

/// Remembers the last observed state and classifies new observations.
///
/// 记住最后观察到的状态并对新的观察进行分类。
#[derive(Debug, Default, Clone)]
pub struct StateTracker {
    last: Option<ConnectivityState>,
}

impl StateTracker {
    pub fn observe(&mut self, state: ConnectivityState) -> Observation {
        match self.last.replace(state) {
            None => Observation::Baseline(state),
            Some(from) if from != state => Observation::Transition { from, to: state },
            Some(_) => Observation::Unchanged,
        }
    }

    pub fn last(&self) -> Option<ConnectivityState> {
        self.last
    }
}

/// The polling loop for one connection.
///
/// 单个连接的轮询循环。
struct StateWatcher {
    service: String,
    channel: Arc<dyn RpcChannel>,
    interval: Duration,
    observed: watch::Sender<ConnectivityState>,
    cancel: CancellationToken,
}

impl StateWatcher {
    /// Polls until cancelled and returns the number of transitions logged.
    ///
    /// 轮询直到被取消，并返回记录的状态转换次数。
    async fn run(self) -> u64 {
        let service = self.service.as_str();
        let mut tracker = StateTracker::default();
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut transitions = 0;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let state = self.channel.state();
            match tracker.observe(state) {
                Observation::Baseline(state) => {
                    info!(service, %state, "{service} state: {state}");
                }
                Observation::Transition { from, to } => {
                    transitions += 1;
                    info!(service, %from, %to, "{service} state: {from} -> {to}");
                }
                Observation::Unchanged => continue,
            }
            self.observed.send_replace(state);
        }

        debug!(service, transitions, "State watcher stopped");
        transitions
    }
}

struct WatcherEntry {
    cancel: CancellationToken,
    handle: JoinHandle<u64>,
}

/// All running watchers, keyed by connection name.
///
/// 所有正在运行的观察器，按连接名称索引。
#[derive(Default)]
pub struct WatcherRegistry {
    watchers: DashMap<String, WatcherEntry>,
    spawned: AtomicUsize,
}

impl std::fmt::Debug for WatcherRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherRegistry")
            .field("running", &self.watchers.len())
            .field("spawned", &self.spawned.load(Ordering::Relaxed))
            .finish()
    }
}

impl WatcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the watcher for `service` and returns the receiving side of
    /// its observed-state channel. The observed state reads IDLE until the
    /// first poll, which happens immediately.
    ///
    /// A name that already has a running watcher is rejected with
    /// [`Error::ConfigurationFatal`] and nothing is spawned.
    ///
    /// 为 `service` 启动观察器，并返回其观察状态通道的接收端。
    /// 已有正在运行的观察器的名称会被拒绝，且不会启动任何任务。
    pub fn spawn(
        &self,
        service: &str,
        channel: Arc<dyn RpcChannel>,
        interval: Duration,
    ) -> Result<watch::Receiver<ConnectivityState>> {
        let slot = match self.watchers.entry(service.to_string()) {
            Entry::Occupied(_) => {
                return Err(Error::ConfigurationFatal(format!(
                    "duplicate connection name {service}"
                )));
            }
            Entry::Vacant(slot) => slot,
        };

        let (observed, observed_rx) = watch::channel(ConnectivityState::Idle);
        let cancel = CancellationToken::new();
        let watcher = StateWatcher {
            service: service.to_string(),
            channel,
            interval,
            observed,
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(watcher.run());
        slot.insert(WatcherEntry { cancel, handle });

        self.spawned.fetch_add(1, Ordering::Relaxed);
        Ok(observed_rx)
    }

    pub fn contains(&self, service: &str) -> bool {
        self.watchers.contains_key(service)
    }

    /// Number of watchers currently running.
    /// 当前正在运行的观察器数量。
    pub fn len(&self) -> usize {
        self.watchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }

    /// Total number of watchers ever spawned by this registry.
    /// 此注册表曾经启动的观察器总数。
    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::Relaxed)
    }

    /// Stops the watcher for `service` and returns how many transitions it logged.
    ///
    /// 停止 `service` 的观察器并返回它记录的转换次数。
    pub async fn cancel(&self, service: &str) -> Option<u64> {
        let (_, entry) = self.watchers.remove(service)?;
        Some(Self::stop(service, entry).await)
    }

    /// Stops every watcher and returns the total number of transitions logged.
    ///
    /// 停止所有观察器并返回记录的转换总数。
    pub async fn cancel_all(&self) -> u64 {
        let names: Vec<String> = self.watchers.iter().map(|e| e.key().clone()).collect();
        let entries: Vec<_> = names
            .into_iter()
            .filter_map(|name| self.watchers.remove(&name))
            .collect();

        for (_, entry) in &entries {
            entry.cancel.cancel();
        }
        let mut total = 0;
        for (name, entry) in entries {
            total += Self::stop(&name, entry).await;
        }
        total
    }

    async fn stop(service: &str, entry: WatcherEntry) -> u64 {
        entry.cancel.cancel();
        match entry.handle.await {
            Ok(transitions) => transitions,
            Err(e) => {
                warn!(service, error = %e, "State watcher ended abnormally");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests;
