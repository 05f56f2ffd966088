use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use atvkit::config::Config;
use atvkit::server::{load_server_config, start_server, start_tls_server, ServerState};

/// Serves an M3U playlist as browsable set-top box pages.
#[derive(Parser, Debug)]
#[command(name = "atvkit", version, disable_version_flag = true)]
struct Cli {
    /// Config file path
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Print the version and exit
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    version: Option<bool>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    let _log_guard = atvkit::logging::init(&config).context("failed to set up logging")?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting atvkit");

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.http_port));
    let tls = match (&config.pem_path, &config.key_path) {
        (Some(pem), Some(key)) => {
            let tls = load_server_config(pem, key).context("failed to load TLS certificate")?;
            Some((SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.https_port)), tls))
        }
        _ => {
            tracing::info!("pemPath/keyPath not set, serving http only");
            None
        }
    };
    let state = Arc::new(ServerState::load(config).await);
    let server = start_server(addr, Arc::clone(&state)).await?;
    let tls_server = match tls {
        Some((tls_addr, tls)) => Some(start_tls_server(tls_addr, tls, state).await?),
        None => None,
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    if let Some(tls_server) = tls_server {
        tls_server.shutdown().await;
    }
    server.shutdown().await;
    Ok(())
}
