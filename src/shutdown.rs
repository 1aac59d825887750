//! 关闭编排器：拥有所有连接和订阅，并在收到终止信号时按顺序清理。
//! Shutdown orchestrator: owns every connection and subscription and cleans
//! them up in order once a termination signal arrives.

use crate::{
    channel::Dialer,
    closer,
    connection::{ConnectionEstablisher, EndpointDescriptor, ManagedConnection},
    error::{Error, Result},
    signal::{ShutdownSignal, SignalListener},
    subscription::Subscription,
    watcher::WatcherRegistry,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The orchestrator's lifecycle phase.
/// 编排器的生命周期阶段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Connections are up and new ones may be registered.
    /// 连接已建立，可以注册新的连接。
    Running,
    /// A signal arrived and closers are running.
    /// 已收到信号，正在执行关闭。
    Stopping,
    /// Every closer has returned. Terminal.
    /// 所有关闭操作均已返回。终态。
    Stopped,
}

/// What happened during shutdown.
///
/// 关闭期间发生的情况。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// The signal that triggered shutdown, if any.
    /// 触发关闭的信号（如果有）。
    pub signal: Option<ShutdownSignal>,
    pub connections_closed: usize,
    pub connection_failures: usize,
    pub subscriptions_closed: usize,
    pub unsubscribe_failures: usize,
    /// Total state transitions logged by the watchers over their lifetime.
    /// 观察器在其生命周期内记录的状态转换总数。
    pub watcher_transitions: u64,
}

impl ShutdownReport {
    /// `true` when every close and unsubscribe succeeded.
    /// 当所有关闭和取消订阅都成功时为 `true`。
    pub fn is_clean(&self) -> bool {
        self.connection_failures == 0 && self.unsubscribe_failures == 0
    }
}

/// Owns the gateway's connections and drives them from startup to exit.
///
/// 拥有网关的连接，并驱动它们从启动到退出。
#[derive(Debug)]
pub struct ShutdownOrchestrator<D: Dialer> {
    establisher: ConnectionEstablisher<D>,
    connections: Vec<ManagedConnection>,
    subscriptions: Vec<Subscription>,
    phase: Phase,
}

impl<D: Dialer> ShutdownOrchestrator<D> {
    pub fn new(dialer: D) -> Self {
        Self {
            establisher: ConnectionEstablisher::new(dialer),
            connections: Vec::new(),
            subscriptions: Vec::new(),
            phase: Phase::Running,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Open connections in registration order.
    /// 按注册顺序排列的已打开连接。
    pub fn connections(&self) -> &[ManagedConnection] {
        &self.connections
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    pub fn watchers(&self) -> &Arc<WatcherRegistry> {
        self.establisher.watchers()
    }

    /// Establishes a connection and takes ownership of it.
    ///
    /// 建立连接并取得其所有权。
    pub fn establish(&mut self, descriptor: EndpointDescriptor) -> Result<&ManagedConnection> {
        self.ensure_running()?;
        let connection = self.establisher.establish(descriptor)?;
        self.connections.push(connection);
        Ok(&self.connections[self.connections.len() - 1])
    }

    /// Takes ownership of a connection established elsewhere so it is closed
    /// on shutdown.
    ///
    /// 取得在其他地方建立的连接的所有权，以便在关闭时关闭它。
    pub fn register_connection(&mut self, connection: ManagedConnection) -> Result<()> {
        self.ensure_running()?;
        debug!(service = connection.name(), "Connection registered");
        self.connections.push(connection);
        Ok(())
    }

    /// Takes ownership of a subscription so it is released on shutdown.
    ///
    /// 取得订阅的所有权，以便在关闭时释放。
    pub fn register_subscription(&mut self, subscription: Subscription) -> Result<()> {
        self.ensure_running()?;
        debug!(subject = subscription.subject(), "Subscription registered");
        self.subscriptions.push(subscription);
        Ok(())
    }

    fn ensure_running(&self) -> Result<()> {
        if self.phase == Phase::Running {
            Ok(())
        } else {
            Err(Error::ShuttingDown)
        }
    }

    /// Blocks until `signals` fires, then shuts everything down.
    ///
    /// 阻塞直到 `signals` 触发，然后关闭所有资源。
    pub async fn run(&mut self, signals: SignalListener) -> ShutdownReport {
        let signal = signals.recv().await;
        match signal {
            Some(signal) => info!(%signal, "got signal {signal}"),
            None => warn!("Signal listener closed without a signal, shutting down"),
        }
        self.shutdown(signal).await
    }

    /// Stops every watcher, then closes connections and subscriptions in
    /// registration order. Failures are logged and counted, never returned.
    /// Calling this again after it completed does nothing and returns an
    /// empty report.
    ///
    /// 停止所有观察器，然后按注册顺序关闭连接和订阅。失败会被记录和计数，但不会返回。
    /// 完成后再次调用不会执行任何操作，并返回空报告。
    pub async fn shutdown(&mut self, signal: Option<ShutdownSignal>) -> ShutdownReport {
        if self.phase != Phase::Running {
            debug!(phase = ?self.phase, "Shutdown already performed");
            return ShutdownReport::default();
        }
        let mut report = ShutdownReport {
            signal,
            ..ShutdownReport::default()
        };

        self.phase = Phase::Stopping;
        info!("stopping server...");

        // Registered connections may carry a watcher from another registry.
        for connection in &self.connections {
            report.watcher_transitions += connection.stop_watcher().await.unwrap_or(0);
        }
        report.watcher_transitions += self.establisher.watchers().cancel_all().await;

        for connection in self.connections.drain(..) {
            if closer::close_connection(&connection).await {
                report.connections_closed += 1;
            } else {
                report.connection_failures += 1;
            }
        }
        for subscription in self.subscriptions.drain(..) {
            if closer::unsubscribe(&subscription).await {
                report.subscriptions_closed += 1;
            } else {
                report.unsubscribe_failures += 1;
            }
        }

        self.phase = Phase::Stopped;
        info!(
            connections_closed = report.connections_closed,
            connection_failures = report.connection_failures,
            subscriptions_closed = report.subscriptions_closed,
            unsubscribe_failures = report.unsubscribe_failures,
            "server stopped"
        );
        report
    }
}
