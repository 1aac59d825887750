//! RPC channel abstraction.
//!
//! The supervisor treats a backend connection as an opaque channel that can
//! be dialed, observed and closed. Establishment and retry happen inside the
//! channel; callers only ever see connectivity states.
//!
//! RPC通道抽象。
//!
//! 监管器将后端连接视为一个不透明的通道，可以拨号、观察和关闭。
//! 建立连接和重试都在通道内部进行；调用者只能看到连通性状态。

pub mod tcp;

use crate::{
    backoff::BackoffPolicy,
    error::{Error, Result},
};
use async_trait::async_trait;
use std::{fmt, time::Duration};

pub use tcp::{TcpChannel, TcpDialer};

/// The connectivity state of a channel. Only the last observed value matters.
///
/// 通道的连通性状态。只有最后观察到的值有意义。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectivityState {
    /// No connection attempt is in progress.
    /// 没有正在进行的连接尝试。
    Idle,
    /// A connection attempt is in progress.
    /// 正在进行连接尝试。
    Connecting,
    /// The channel is connected and usable.
    /// 通道已连接且可用。
    Ready,
    /// The last attempt failed or the connection dropped; a retry is scheduled.
    /// 上一次尝试失败或连接断开；已安排重试。
    TransientFailure,
    /// The channel has been closed and will not reconnect.
    /// 通道已关闭且不会重连。
    Shutdown,
}

impl ConnectivityState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectivityState::Idle => "IDLE",
            ConnectivityState::Connecting => "CONNECTING",
            ConnectivityState::Ready => "READY",
            ConnectivityState::TransientFailure => "TRANSIENT_FAILURE",
            ConnectivityState::Shutdown => "SHUTDOWN",
        }
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters handed to a [`Dialer`] for a single channel.
///
/// 为单个通道传递给 [`Dialer`] 的参数。
#[derive(Debug, Clone)]
pub struct DialParams {
    /// Upper bound for each individual connection attempt.
    /// 每次单独连接尝试的上限。
    pub connect_timeout: Duration,
    /// Delay policy between failed attempts.
    /// 失败尝试之间的延迟策略。
    pub backoff: BackoffPolicy,
}

/// A dialed RPC channel.
///
/// 已拨号的RPC通道。
#[async_trait]
pub trait RpcChannel: Send + Sync + fmt::Debug + 'static {
    /// The target this channel was dialed against.
    /// 此通道拨号的目标。
    fn target(&self) -> &str;

    /// Reads the current connectivity state without blocking.
    /// 非阻塞地读取当前连通性状态。
    fn state(&self) -> ConnectivityState;

    /// Closes the channel. Closing twice returns [`Error::AlreadyClosed`].
    /// 关闭通道。重复关闭会返回 [`Error::AlreadyClosed`]。
    async fn close(&self) -> Result<()>;
}

/// Creates channels without waiting for the remote to be reachable.
///
/// `dial` must return as soon as the channel exists; it only fails for
/// targets that can never be connected to, such as malformed addresses.
///
/// 创建通道而无需等待远端可达。
///
/// `dial` 必须在通道创建后立即返回；只有对永远无法连接的目标（如格式错误的地址）才会失败。
pub trait Dialer: Send + Sync {
    type Channel: RpcChannel;

    fn dial(&self, target: &str, params: DialParams) -> Result<Self::Channel>;
}

/// A parsed `host:port` dial target.
///
/// 已解析的 `host:port` 拨号目标。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
}

impl Target {
    /// Parses `host:port`, `[v6]:port`, optionally prefixed with `dns:///`
    /// or `passthrough:///`.
    ///
    /// 解析 `host:port` 或 `[v6]:port`，可带 `dns:///` 或 `passthrough:///` 前缀。
    pub fn parse(address: &str) -> Result<Self> {
        let invalid = |reason| Error::InvalidAddress {
            address: address.to_string(),
            reason,
        };

        let rest = ["dns:///", "passthrough:///"]
            .iter()
            .find_map(|scheme| address.strip_prefix(scheme))
            .unwrap_or(address);
        if rest.contains("://") {
            return Err(invalid("unsupported scheme"));
        }

        let (host, port) = rest.rsplit_once(':').ok_or_else(|| invalid("missing port"))?;
        let host = match host.strip_prefix('[') {
            Some(v6) => v6
                .strip_suffix(']')
                .ok_or_else(|| invalid("unterminated IPv6 literal"))?,
            None if host.contains(':') => return Err(invalid("IPv6 literal must be bracketed")),
            None => host,
        };
        if host.is_empty() {
            return Err(invalid("empty host"));
        }
        let port = port.parse::<u16>().map_err(|_| invalid("invalid port"))?;

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
