//! Gateway server binary: loads configuration, builds the router, and
//! serves until interrupted.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use gateway::GatewayConfig;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gateway-server", version, about = "ChainView admin gateway")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "config/gateway.yaml")]
    config: PathBuf,
}

/// YAML file first, then `GATEWAY_`-prefixed environment variables on top
/// (nested keys split on `__`, e.g. `GATEWAY_AUTH__SECRET`).
fn load_config(path: &PathBuf) -> anyhow::Result<GatewayConfig> {
    Figment::new()
        .merge(Yaml::file(path))
        .merge(Env::prefixed("GATEWAY_").split("__"))
        .extract()
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = load_config(&cli.config)?;
    let router = gateway::build_router(&config)?;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for shutdown signal");
            return;
        }
        tracing::info!("shutdown signal received");
        signal_cancel.cancel();
    });

    gateway::serve(&config, router, cancel).await
}
