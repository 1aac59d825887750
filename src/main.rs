//! The front gateway process: dial every configured backend, watch the
//! connections, and close them when SIGINT or SIGTERM arrives.

use anyhow::Context;
use front_gateway::{
    EndpointDescriptor, ShutdownOrchestrator, SignalListener, TcpDialer, config::Config, logging,
};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    logging::init(&config.logging)?;

    // Any error reaching this point is a fatal startup error: the process
    // exits non-zero before waiting for signals.
    supervise(config)
        .await
        .inspect_err(|e| error!("{e:#}"))
}

async fn supervise(config: Config) -> anyhow::Result<()> {
    // Installed before dialing so a signal during startup is not lost.
    let signals = SignalListener::install().context("install signal handlers")?;

    let mut orchestrator = ShutdownOrchestrator::new(TcpDialer);
    if config.services.is_empty() {
        warn!("No backend services configured");
    }
    for service in &config.services {
        let descriptor =
            EndpointDescriptor::new(&service.name, &service.address, &config.connection);
        orchestrator.establish(descriptor)?;
    }

    info!(connections = orchestrator.connections().len(), "server started");
    let report = orchestrator.run(signals).await;
    if !report.is_clean() {
        warn!(?report, "Shutdown finished with cleanup errors");
    }
    Ok(())
}
