//! 定义了受管连接及其建立过程。
//! Defines managed connections and how they are established.

use crate::{
    backoff::{self, BackoffPolicy},
    channel::{ConnectivityState, DialParams, Dialer, RpcChannel},
    config::ConnectionConfig,
    error::{Error, Result},
    watcher::WatcherRegistry,
};
use std::{sync::Arc, time::Duration};
use tokio::sync::watch;
use tracing::info;

/// Everything needed to dial and supervise one backend service.
///
/// 拨号和监管一个后端服务所需的全部信息。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    /// Label used in every log line about this connection.
    /// 关于此连接的每条日志中使用的标签。
    pub name: String,
    /// The dial target. Must not be empty.
    /// 拨号目标。不能为空。
    pub address: String,
    pub connect_timeout: Duration,
    pub reconnect_interval: Duration,
    pub state_check_interval: Duration,
}

impl EndpointDescriptor {
    /// Creates a descriptor using the shared connection parameters.
    ///
    /// 使用共享的连接参数创建描述符。
    pub fn new(name: impl Into<String>, address: impl Into<String>, config: &ConnectionConfig) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            connect_timeout: config.connect_timeout,
            reconnect_interval: config.reconnect_interval,
            state_check_interval: config.state_check_interval,
        }
    }
}

/// A dialed connection with its state watcher running.
///
/// The descriptor holds the intervals actually in effect, after sanitizing.
///
/// 已拨号且其状态观察器正在运行的连接。
///
/// 描述符保存经过校验后实际生效的间隔。
#[derive(Debug)]
pub struct ManagedConnection {
    descriptor: EndpointDescriptor,
    channel: Arc<dyn RpcChannel>,
    observed: watch::Receiver<ConnectivityState>,
    /// The registry running this connection's watcher.
    watchers: Arc<WatcherRegistry>,
}

impl ManagedConnection {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &EndpointDescriptor {
        &self.descriptor
    }

    pub fn channel(&self) -> &Arc<dyn RpcChannel> {
        &self.channel
    }

    /// The state most recently recorded by this connection's watcher.
    ///
    /// 此连接的观察器最近记录的状态。
    pub fn observed_state(&self) -> ConnectivityState {
        *self.observed.borrow()
    }

    /// Stops this connection's watcher, wherever it was registered, and
    /// returns how many transitions it logged. `None` if it already stopped.
    ///
    /// 停止此连接的观察器（无论它注册在何处），并返回其记录的转换次数。
    /// 如果已停止则返回 `None`。
    pub async fn stop_watcher(&self) -> Option<u64> {
        self.watchers.cancel(self.name()).await
    }

    /// A receiver that is notified on every state change the watcher records.
    /// 每当观察器记录到状态变化时都会收到通知的接收端。
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectivityState> {
        self.observed.clone()
    }
}

/// Dials endpoints and attaches a state watcher to each.
///
/// 拨号端点并为每个端点附加一个状态观察器。
#[derive(Debug)]
pub struct ConnectionEstablisher<D: Dialer> {
    dialer: D,
    watchers: Arc<WatcherRegistry>,
}

impl<D: Dialer> ConnectionEstablisher<D> {
    pub fn new(dialer: D) -> Self {
        Self {
            dialer,
            watchers: Arc::new(WatcherRegistry::new()),
        }
    }

    pub fn watchers(&self) -> &Arc<WatcherRegistry> {
        &self.watchers
    }

    /// Establishes a connection from loose parameters.
    ///
    /// 从零散参数建立连接。
    pub fn establish_with(
        &self,
        name: &str,
        address: &str,
        connect_timeout: Duration,
        reconnect_interval: Duration,
        state_check_interval: Duration,
    ) -> Result<ManagedConnection> {
        self.establish(EndpointDescriptor {
            name: name.to_string(),
            address: address.to_string(),
            connect_timeout,
            reconnect_interval,
            state_check_interval,
        })
    }

    /// Dials `descriptor` without waiting for the remote and starts its watcher.
    ///
    /// An empty address, a duplicate name or a dial that fails synchronously
    /// is returned as [`Error::ConfigurationFatal`]; no watcher is started
    /// in that case.
    ///
    /// 拨号 `descriptor` 而不等待远端，并启动其观察器。
    ///
    /// 空地址、重复名称或同步失败的拨号都会作为 [`Error::ConfigurationFatal`] 返回；
    /// 这种情况下不会启动观察器。
    pub fn establish(&self, descriptor: EndpointDescriptor) -> Result<ManagedConnection> {
        let name = descriptor.name.as_str();
        info!(service = name, address = %descriptor.address, "creating connection {name}");

        if descriptor.address.is_empty() {
            return Err(Error::ConfigurationFatal(format!(
                "empty address for {name} connection"
            )));
        }
        if self.watchers.contains(name) {
            return Err(Error::ConfigurationFatal(format!(
                "duplicate connection name {name}"
            )));
        }

        let intervals = backoff::sanitize(
            name,
            descriptor.reconnect_interval,
            descriptor.state_check_interval,
        );
        let params = DialParams {
            connect_timeout: descriptor.connect_timeout,
            backoff: BackoffPolicy::with_max_delay(intervals.reconnect_interval),
        };

        let channel = self
            .dialer
            .dial(&descriptor.address, params)
            .map_err(|e| Error::ConfigurationFatal(format!("{name} connection: {e}")))?;
        let channel: Arc<dyn RpcChannel> = Arc::new(channel);

        let observed = self
            .watchers
            .spawn(name, channel.clone(), intervals.state_check_interval)?;

        Ok(ManagedConnection {
            descriptor: EndpointDescriptor {
                reconnect_interval: intervals.reconnect_interval,
                state_check_interval: intervals.state_check_interval,
                ..descriptor
            },
            channel,
            observed,
            watchers: self.watchers.clone(),
        })
    }
}
