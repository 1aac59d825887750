//! A stand-in backend for local runs: accepts connections on
//! `MOCK_SERVICE_PORT` and holds them open until SIGINT or SIGTERM.

use anyhow::Context;
use clap::Parser;
use front_gateway::{
    SignalListener,
    config::{LogFormat, LoggingConfig},
    logging,
};
use std::net::{Ipv4Addr, SocketAddr};
use tokio::{
    io::AsyncReadExt,
    net::{TcpListener, TcpStream},
    task::JoinSet,
};
use tracing::{debug, info, warn};

#[derive(Debug, Parser)]
#[command(name = "mock-service", about = "Mock dependant service for the front gateway")]
struct Cli {
    /// TCP port to listen on.
    #[arg(long, env = "MOCK_SERVICE_PORT", default_value_t = 9000)]
    port: u16,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&LoggingConfig {
        filter: cli.log_level,
        format: cli.log_format,
    })?;

    let signals = SignalListener::install().context("install signal handlers")?;
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, cli.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(%addr, "mock service listening");

    let mut peers = JoinSet::new();
    let shutdown = signals.recv();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                if let Some(signal) = signal {
                    info!(%signal, "got signal {signal}");
                }
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "Accepted connection");
                    peers.spawn(hold(stream));
                }
                Err(e) => warn!(error = %e, "Accept failed"),
            },
            Some(_) = peers.join_next(), if !peers.is_empty() => {}
        }
    }

    info!(open = peers.len(), "stopping dependant mock...");
    peers.shutdown().await;
    Ok(())
}

/// Keeps a peer connected until it hangs up, discarding anything it sends.
async fn hold(mut stream: TcpStream) {
    let mut buf = [0u8; 1024];
    while let Ok(n) = stream.read(&mut buf).await {
        if n == 0 {
            break;
        }
    }
}
