//! api-tape server
//!
//! Entry point for the record/replay proxy. Parses CLI flags, validates the
//! configuration, and serves until externally terminated.

use api_tape::{ProxyConfig, TapeProxy};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    let config = ProxyConfig::parse();

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    info!("Starting api-tape");
    info!("  - Mode: {}", config.mode);
    info!("  - Target: {}", config.target);
    info!("  - Port: {}", config.port);
    info!("  - Tape directory: {}", config.dir.display());

    let proxy = Arc::new(TapeProxy::new(Arc::new(config))?);
    proxy.start().await?;

    Ok(())
}
