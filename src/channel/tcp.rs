//! TCP-backed channel using an actor for the reconnect loop.
//!
//! 使用actor执行重连循环的TCP通道。

use super::{ConnectivityState, DialParams, Dialer, RpcChannel, Target};
use crate::{
    backoff::Backoff,
    error::{Error, Result},
};
use async_trait::async_trait;
use tokio::{
    io::AsyncReadExt,
    net::TcpStream,
    sync::{mpsc, oneshot, watch},
    time,
};
use tracing::debug;

/// Commands for the connector actor.
///
/// 连接器actor的命令。
#[derive(Debug)]
enum ConnectorCommand {
    /// Drop the connection and stop reconnecting.
    /// 断开连接并停止重连。
    Shutdown { response_tx: oneshot::Sender<()> },
}

/// Dials [`TcpChannel`]s.
///
/// 拨号 [`TcpChannel`]。
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

impl Dialer for TcpDialer {
    type Channel = TcpChannel;

    fn dial(&self, target: &str, params: DialParams) -> Result<TcpChannel> {
        let parsed = Target::parse(target)?;
        let (state_tx, state_rx) = watch::channel(ConnectivityState::Idle);
        let (command_tx, command_rx) = mpsc::channel(8);

        let connector = Connector {
            address: parsed.to_string(),
            target: parsed,
            params: params.clone(),
            backoff: Backoff::new(params.backoff),
            state_tx,
            command_rx,
        };
        tokio::spawn(connector.run());

        Ok(TcpChannel {
            target: target.to_string(),
            state_rx,
            command_tx,
        })
    }
}

/// A handle to a TCP connection that keeps itself connected.
///
/// Dropping the handle stops the connector.
///
/// 一个会自行保持连接的TCP连接句柄。
///
/// 丢弃该句柄会停止连接器。
#[derive(Debug)]
pub struct TcpChannel {
    target: String,
    state_rx: watch::Receiver<ConnectivityState>,
    command_tx: mpsc::Sender<ConnectorCommand>,
}

#[async_trait]
impl RpcChannel for TcpChannel {
    fn target(&self) -> &str {
        &self.target
    }

    fn state(&self) -> ConnectivityState {
        *self.state_rx.borrow()
    }

    async fn close(&self) -> Result<()> {
        if self.state() == ConnectivityState::Shutdown {
            return Err(Error::AlreadyClosed);
        }
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(ConnectorCommand::Shutdown { response_tx })
            .await
            .map_err(|_| Error::AlreadyClosed)?;
        // The actor drops queued commands once it has shut down, which
        // makes a racing second close observe `AlreadyClosed` here.
        response_rx.await.map_err(|_| Error::AlreadyClosed)
    }
}

/// Actor that owns the socket and drives establishment and retry.
///
/// 拥有套接字并驱动连接建立和重试的actor。
struct Connector {
    address: String,
    target: Target,
    params: DialParams,
    backoff: Backoff,
    state_tx: watch::Sender<ConnectivityState>,
    command_rx: mpsc::Receiver<ConnectorCommand>,
}

impl Connector {
    /// Runs the actor's main loop until shut down.
    ///
    /// 运行actor的主循环直到被关闭。
    async fn run(mut self) {
        loop {
            self.publish(ConnectivityState::Connecting);
            let attempt = time::timeout(
                self.params.connect_timeout,
                TcpStream::connect((self.target.host.clone(), self.target.port)),
            );

            let outcome = tokio::select! {
                command = self.command_rx.recv() => return self.shutdown(command),
                outcome = attempt => outcome,
            };

            match outcome {
                Ok(Ok(mut stream)) => {
                    self.backoff.reset();
                    self.publish(ConnectivityState::Ready);
                    debug!(address = %self.address, "Connection established");

                    let closed = tokio::select! {
                        command = self.command_rx.recv() => return self.shutdown(command),
                        closed = wait_closed(&mut stream) => closed,
                    };
                    match closed {
                        Ok(()) => debug!(address = %self.address, "Connection closed by peer"),
                        Err(e) => debug!(address = %self.address, error = %e, "Connection lost"),
                    }
                }
                Ok(Err(e)) => {
                    debug!(address = %self.address, error = %e, "Connection attempt failed");
                }
                Err(_) => {
                    debug!(
                        address = %self.address,
                        timeout = ?self.params.connect_timeout,
                        "Connection attempt timed out"
                    );
                }
            }

            self.publish(ConnectivityState::TransientFailure);
            let delay = self.backoff.next_delay();
            debug!(address = %self.address, ?delay, attempt = self.backoff.attempt(), "Scheduling reconnect");

            tokio::select! {
                command = self.command_rx.recv() => return self.shutdown(command),
                _ = time::sleep(delay) => {}
            }
        }
    }

    fn publish(&self, state: ConnectivityState) {
        // Every handle holds a receiver, so a send error only means all
        // handles are gone and the next command poll ends the actor.
        let _ = self.state_tx.send(state);
    }

    /// `command` is `None` when every handle has been dropped.
    fn shutdown(&mut self, command: Option<ConnectorCommand>) {
        self.publish(ConnectivityState::Shutdown);
        self.command_rx.close();
        debug!(address = %self.address, "Connector has shut down");
        if let Some(ConnectorCommand::Shutdown { response_tx }) = command {
            let _ = response_tx.send(());
        }
    }
}

/// Resolves once the peer closes the stream or it fails.
async fn wait_closed(stream: &mut TcpStream) -> std::io::Result<()> {
    let mut buf = [0u8; 1024];
    loop {
        if stream.read(&mut buf).await? == 0 {
            return Ok(());
        }
    }
}
