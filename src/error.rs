//! 定义了库中所有可能的错误类型。
//! Defines all possible error types in the library.

use thiserror::Error;

/// The primary error type for the gateway connection supervisor.
/// 网关连接监管器的主要错误类型。
#[derive(Debug, Error)]
pub enum Error {
    /// An unrecoverable misconfiguration. The process must not continue
    /// starting up once this is observed.
    ///
    /// 不可恢复的配置错误。一旦出现，进程不得继续启动。
    #[error("fatal configuration error: {0}")]
    ConfigurationFatal(String),

    /// An underlying I/O error occurred.
    /// 发生了底层的I/O错误。
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A dial target could not be parsed.
    /// 无法解析拨号目标。
    #[error("invalid target address {address:?}: {reason}")]
    InvalidAddress {
        address: String,
        reason: &'static str,
    },

    /// The channel has already been closed.
    /// 通道已经关闭。
    #[error("channel is already closed")]
    AlreadyClosed,

    /// The supervisor no longer accepts new connections.
    /// 监管器不再接受新的连接。
    #[error("supervisor is shutting down")]
    ShuttingDown,

    /// The subscription could not be released.
    /// 无法释放订阅。
    #[error("unsubscribe failed: {0}")]
    Unsubscribe(String),
}

impl Error {
    /// Returns `true` for errors that must terminate the process at startup.
    ///
    /// 对于必须在启动时终止进程的错误返回 `true`。
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::ConfigurationFatal(_))
    }
}

/// A specialized `Result` type for this library.
/// 本库专用的 `Result` 类型。
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        use std::io::ErrorKind;
        match err {
            Error::Io(e) => e,
            Error::ConfigurationFatal(msg) => std::io::Error::new(ErrorKind::InvalidInput, msg),
            Error::InvalidAddress { .. } => std::io::Error::new(ErrorKind::InvalidInput, err),
            Error::AlreadyClosed => ErrorKind::NotConnected.into(),
            Error::ShuttingDown => ErrorKind::ConnectionAborted.into(),
            Error::Unsubscribe(msg) => std::io::Error::other(msg),
        }
    }
}
