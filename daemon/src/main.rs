/// Taskhub daemon entry point: config, logging, reaper, HTTP listener.
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use taskhub_core::{escalation, TaskhubConfig, Taskhub};
use taskhub_daemon::{run_server, JsonRpcServer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "taskhub-daemon")]
#[command(about = "Coordination service for autonomous agents", long_about = None)]
#[command(version)]
struct Args {
    /// Path to taskhub.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind address
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the data directory
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = TaskhubConfig::load_or_default(args.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(data_dir) = args.data_dir {
        config.storage.data_dir = data_dir;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    let hub = Arc::new(Taskhub::new(config).context("failed to initialize hub")?);
    let reaper = escalation::spawn_reaper(Arc::clone(&hub));
    let rpc = Arc::new(JsonRpcServer::new(Arc::clone(&hub)));

    run_server(addr, rpc, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
    })
    .await
    .context("server error")?;

    reaper.abort();
    hub.close().await;
    info!("taskhub daemon stopped");
    Ok(())
}
