//! # heatrelay
//!
//! Relay binary: loads settings, starts the `WebSocket` listener, the
//! optional static asset listener and the upstream link, then runs until
//! Ctrl-C.

#![deny(unsafe_code)]

mod cli;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use heatrelay_server::RelayServer;
use tracing::info;

use crate::cli::{Cli, server_config, upstream_config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Settings first: they carry the log level.
    let path = cli
        .config
        .clone()
        .unwrap_or_else(heatrelay_settings::settings_path);
    let mut settings = heatrelay_settings::load_settings_from_path(&path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;
    cli.apply(&mut settings);
    settings.validate().context("invalid configuration")?;

    logging::init_subscriber(&settings.logging.level, settings.logging.format);
    info!(path = %path.display(), "settings loaded");

    let metrics = heatrelay_server::metrics::install_recorder()
        .context("failed to install metrics recorder")?;
    let server = RelayServer::with_ws_upstream(
        server_config(&settings),
        upstream_config(&settings),
        Some(metrics),
    );

    let (addr, ws_task) = server
        .listen()
        .await
        .context("failed to start WebSocket listener")?;
    let mut tasks = vec![ws_task];
    if let Some((_, static_task)) = server
        .listen_static()
        .await
        .context("failed to start static asset listener")?
    {
        tasks.push(static_task);
    }
    tasks.push(server.spawn_upstream());

    info!(
        %addr,
        upstream = %settings.upstream.url,
        "heatrelay running"
    );

    server.shutdown().wait_for_signal().await;
    info!("shutting down");
    server.shutdown().graceful_shutdown(tasks, None).await;
    info!("shutdown complete");
    Ok(())
}
