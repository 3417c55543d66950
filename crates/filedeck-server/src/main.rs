//! filedeck server binary.
//!
//! Usage:
//!   filedeck-server [--config FILE] [--port PORT] [--bind ADDR] [--root DIR]
//!
//! Environment:
//!   RUST_LOG  log filter (default `info`)

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use filedeck_server::{AppState, ServerConfig, router};

#[derive(Debug, Parser)]
#[command(name = "filedeck-server", version, about = "HTTP resource server for filedeck")]
struct Cli {
    /// TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind (overrides the config).
    #[arg(long)]
    bind: Option<String>,

    /// Data root (overrides the config).
    #[arg(long)]
    root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }
    if let Some(root) = cli.root {
        config.root = root;
    }

    let state = AppState::from_config(&config).context("failed to set up server state")?;
    if state.users.is_empty() {
        tracing::warn!("no users configured; every request will be rejected");
    }

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(
        %addr,
        root = %config.root.display(),
        users = state.users.len(),
        "filedeck server listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {e}");
    }
}
