//! Termination signal delivery.
//!
//! The first SIGINT or SIGTERM is forwarded into a single-slot channel that
//! the orchestrator reads exactly once. Anything after that is dropped.
//!
//! 终止信号的投递。
//!
//! 第一个 SIGINT 或 SIGTERM 会被转发到一个单槽通道中，由编排器读取且只读取一次。之后的信号都会被丢弃。

use crate::error::Result;
use std::fmt;
use tokio::sync::mpsc;
use tracing::debug;

/// A signal that requests shutdown.
/// 请求关闭的信号。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGINT, or Ctrl+C on platforms without Unix signals.
    Interrupt,
    /// SIGTERM.
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::Interrupt => f.write_str("SIGINT"),
            ShutdownSignal::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// Sending side of a [`SignalListener`].
///
/// [`SignalListener`] 的发送端。
#[derive(Debug, Clone)]
pub struct SignalTrigger {
    tx: mpsc::Sender<ShutdownSignal>,
}

impl SignalTrigger {
    /// Delivers `signal` unless one is already pending or the listener is gone.
    /// Returns whether it was delivered.
    ///
    /// 投递 `signal`，除非已有待处理的信号或监听器已不存在。返回是否已投递。
    pub fn trigger(&self, signal: ShutdownSignal) -> bool {
        match self.tx.try_send(signal) {
            Ok(()) => true,
            Err(_) => {
                debug!(%signal, "Shutdown already requested, ignoring signal");
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receives at most one shutdown request.
///
/// 最多接收一个关闭请求。
#[derive(Debug)]
pub struct SignalListener {
    rx: mpsc::Receiver<ShutdownSignal>,
}

impl SignalListener {
    /// A listener fed only through the returned trigger.
    ///
    /// 仅通过返回的触发器接收信号的监听器。
    pub fn manual() -> (SignalTrigger, SignalListener) {
        let (tx, rx) = mpsc::channel(1);
        (SignalTrigger { tx }, SignalListener { rx })
    }

    /// A listener fed by the process's SIGINT and SIGTERM handlers.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// 由进程的 SIGINT 和 SIGTERM 处理程序提供信号的监听器。
    ///
    /// 必须在Tokio运行时中调用。
    pub fn install() -> Result<Self> {
        let (trigger, listener) = Self::manual();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            let mut interrupt = signal(SignalKind::interrupt())?;
            let mut terminate = signal(SignalKind::terminate())?;
            tokio::spawn(async move {
                loop {
                    let received = tokio::select! {
                        Some(()) = interrupt.recv() => ShutdownSignal::Interrupt,
                        Some(()) = terminate.recv() => ShutdownSignal::Terminate,
                        else => break,
                    };
                    trigger.trigger(received);
                    if trigger.is_closed() {
                        break;
                    }
                }
            });
        }

        #[cfg(not(unix))]
        {
            tokio::spawn(async move {
                while tokio::signal::ctrl_c().await.is_ok() {
                    trigger.trigger(ShutdownSignal::Interrupt);
                    if trigger.is_closed() {
                        break;
                    }
                }
            });
        }

        Ok(listener)
    }

    /// Waits for the shutdown request. Returns `None` if every trigger was
    /// dropped without firing.
    ///
    /// 等待关闭请求。如果所有触发器都在未触发的情况下被丢弃，则返回 `None`。
    pub async fn recv(mut self) -> Option<ShutdownSignal> {
        self.rx.recv().await
    }
}
