#![deny(clippy::expect_used, clippy::unwrap_used)]

//! The connection-lifecycle layer of the front gateway.
//! 前端网关的连接生命周期层。

pub mod backoff;
pub mod channel;
pub mod closer;
pub mod config;
pub mod connection;
pub mod error;
pub mod logging;
pub mod shutdown;
pub mod signal;
pub mod subscription;
pub mod watcher;

pub use channel::{ConnectivityState, Dialer, RpcChannel, TcpDialer};
pub use connection::{ConnectionEstablisher, EndpointDescriptor, ManagedConnection};
pub use error::{Error, Result};
pub use shutdown::{Phase, ShutdownOrchestrator, ShutdownReport};
pub use signal::{ShutdownSignal, SignalListener};
pub use subscription::{Subscription, Unsubscribe};
