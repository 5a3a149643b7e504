//! Binary entrypoint (C10, §4.10). No CLI parsing (out of scope per §1): the config file path is
//! read from `RECON_CONFIG_PATH`, if set, and `RconConfig::load` layers environment overrides on
//! top either way.

use std::path::PathBuf;

use anyhow::Context;
use recon_config::RconConfig;
use recon_node::{scheduler, Node};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config_path = std::env::var("RECON_CONFIG_PATH").ok().map(PathBuf::from);
    let config = RconConfig::load(config_path.as_deref()).context("failed to load configuration")?;
    info!(tunables = config.describe().len(), "configuration loaded");

    let node = std::sync::Arc::new(Node::build(config).context("failed to wire process components")?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = tokio::spawn(scheduler::run(node, shutdown_rx));

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("shutdown signal received, draining in-flight work");
    let _ = shutdown_tx.send(true);

    scheduler_handle.await.context("scheduler task panicked")?;
    info!("shutdown complete");
    Ok(())
}
