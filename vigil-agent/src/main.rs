//! Vigil Agent - heartbeat push client for the Vigil fleet monitor
//!
//! Periodically reports liveness of this machine to the central server:
//! - First-run interactive setup (config in the OS config directory)
//! - Steady-interval heartbeats with capped exponential backoff on failure
//! - Shared status board for log/UI readers
//! - Graceful shutdown on Ctrl-C (no heartbeat is sent after the stop)

mod backoff;
mod config;
mod sender;
mod status;
mod wizard;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::AgentConfig;
use crate::sender::HeartbeatSender;
use crate::status::StatusBoard;
use crate::wizard::SetupWizard;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    info!("Vigil agent starting...");

    let config = load_or_configure().await?;
    info!(
        device = %config.device_name,
        server = %config.server_url,
        interval_secs = config.heartbeat_interval_secs,
        "configuration loaded"
    );

    let board = StatusBoard::new();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown requested");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                error!("cannot listen for Ctrl-C: {e}");
                // keep the channel open so the sender is not stopped by a
                // closed handle it would read as a shutdown
                std::future::pending::<()>().await;
            }
        }
    });

    let mut sender = HeartbeatSender::new(config, board.clone(), shutdown_rx)
        .context("failed to create heartbeat sender")?;
    sender.run().await;

    let last = board.snapshot();
    info!(heartbeats = last.heartbeat_count, "agent stopped");
    Ok(())
}

/// Configuration is a precondition of the send loop: a missing, unreadable
/// or incomplete file blocks here in the setup wizard until the operator
/// completes it. This is never a retry case.
async fn load_or_configure() -> Result<AgentConfig> {
    if AgentConfig::is_first_time_setup() {
        info!("no configuration found, running first-time setup");
        return SetupWizard::run().await;
    }

    match AgentConfig::load().await {
        Ok(config) if config.is_complete() => Ok(config),
        Ok(_) => {
            warn!("configuration incomplete, running setup");
            SetupWizard::run().await
        }
        Err(e) => {
            warn!("configuration unreadable ({e:#}), running setup");
            SetupWizard::run().await
        }
    }
}
