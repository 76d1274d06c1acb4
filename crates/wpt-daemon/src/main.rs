//! wpt-daemon: serves the attack control plane over HTTP and mirrors scan
//! telemetry over the secondary radio link.

use anyhow::{Context, Result};
use tracing::info;
use wpt_core::config::Config;
use wpt_daemon::daemon::Daemon;
use wpt_telemetry::logging::{init_logging, LogFormat};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    init_logging(
        "wpt-daemon",
        &config.logging.level,
        LogFormat::from_json_flag(config.logging.json),
    );
    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = std::process::id(),
        "wpt daemon starting"
    );

    let daemon = Daemon::new(config).await?;
    let shutdown = daemon.shutdown_handle();

    // Wire ctrl-c to trigger graceful shutdown.
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        info!("ctrl-c received, initiating shutdown");
        shutdown.trigger();
    });

    daemon.run().await
}
