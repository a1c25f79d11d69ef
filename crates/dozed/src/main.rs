//! dozed — the doze daemon.
//!
//! Single binary that wires the pieces together:
//! - OVH API client (signed requests)
//! - SSH cleanup runner
//! - Minecraft status probe
//! - Control plane + idle watch
//! - REST API
//!
//! # Usage
//!
//! ```text
//! dozed --config /etc/doze/doze.toml
//! ```

mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use doze_control::{CleanupCommands, ControlPlane, InstanceService, WatchDelays};
use doze_exec::{SshConfig, SshRunner};
use doze_ovh::{OvhClient, OvhCredentials};
use doze_ping::ServerPinger;

use crate::config::DozeConfig;

#[derive(Parser)]
#[command(
    name = "dozed",
    about = "Wakes a shelved Minecraft host on demand and shelves it when idle"
)]
struct Cli {
    /// Path to the TOML configuration.
    #[arg(long, default_value = "/etc/doze/doze.toml")]
    config: PathBuf,

    /// Listen address override.
    #[arg(long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dozed=debug,doze=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = DozeConfig::from_file(&cli.config)?;
    let listen = cli.listen.unwrap_or(config.server.listen);

    run(config, listen).await
}

async fn run(config: DozeConfig, listen: SocketAddr) -> anyhow::Result<()> {
    info!("doze daemon starting");

    // ── Assemble services ──────────────────────────────────────

    let api = OvhClient::new(OvhCredentials {
        endpoint: config.ovh.endpoint.clone(),
        application_key: config.ovh.application_key.clone(),
        application_secret: config.ovh.application_secret.clone(),
        consumer_key: config.ovh.consumer_key.clone(),
    })?;

    let runner = SshRunner::new(SshConfig {
        host: config.ssh_host().to_string(),
        port: config.ssh.port,
        username: config.ssh.username.clone(),
        private_key: config.ssh.private_key.clone(),
    });
    info!(host = %config.ssh_host(), port = config.ssh.port, "cleanup runner ready");

    let mut commands = CleanupCommands::default();
    if let Some(command) = config.ssh.stop_proxy_command.clone() {
        commands.stop_proxy = command;
    }
    if let Some(command) = config.ssh.clear_build_data_command.clone() {
        commands.clear_build_data = command;
    }

    let instances = Arc::new(InstanceService::new(
        api,
        &config.ovh.service_id,
        &config.ovh.instance_id,
        Arc::new(runner),
        commands,
    ));
    info!(instance = %config.ovh.instance_id, "instance service ready");

    let pinger = ServerPinger::new(
        &config.minecraft.host,
        config.minecraft.port,
        config.probe_timeout(),
    );
    info!(
        host = %config.minecraft.host,
        port = config.minecraft.port,
        "server pinger ready"
    );

    let delays = WatchDelays {
        initial: Duration::from_secs(config.watch.initial_delay_secs),
        recheck: Duration::from_secs(config.watch.recheck_delay_secs),
        error_backoff: Duration::from_secs(config.watch.error_backoff_secs),
    };
    let plane = Arc::new(ControlPlane::new(instances, pinger, delays));

    // ── Start API server ───────────────────────────────────────

    let router = doze_api::build_router(plane, config.server.auth_token.clone());

    info!(%listen, auth = config.server.auth_token.is_some(), "API server starting");

    let listener = tokio::net::TcpListener::bind(listen).await?;

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C handler");
            info!("shutdown signal received");
        })
        .await?;

    info!("doze daemon stopped");
    Ok(())
}
