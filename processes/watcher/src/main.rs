//! Nebula marketplace watcher process

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use config::{Config, Environment, File};
use nebula_common::{EventHandler, MarketplaceEvent};
use nebula_module_marketplace_watcher::MarketplaceWatcher;
use tokio::sync::watch;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, clap::Parser)]
#[command(version, about = "Follows the chain and projects Nebula marketplace activity")]
struct Args {
    #[arg(long, value_name = "PATH", default_values_t = vec!["watcher.toml".to_string()])]
    config: Vec<String>,

    /// Bulk catch-up: sparse checkpoints, no event delivery, no compaction
    #[arg(long)]
    sync: bool,

    /// Overrides database-path
    #[arg(long, value_name = "PATH")]
    database: Option<String>,
}

/// Writes every confirmed event to the log as one JSON line
struct LoggingEventHandler;

#[async_trait]
impl EventHandler for LoggingEventHandler {
    async fn handle_events(&self, events: &[MarketplaceEvent]) -> Result<()> {
        for event in events {
            info!(kind = %event.kind, "{}", serde_json::to_string(event)?);
        }
        Ok(())
    }

    async fn on_change(&self) {
        debug!("Projection changed");
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let mut builder = Config::builder();
    for file in &args.config {
        builder = builder.add_source(File::with_name(file));
    }
    builder = builder.add_source(Environment::with_prefix("NEBULA").separator("__"));

    if args.sync {
        builder = builder.set_override("fast-sync", true)?;
    }
    if let Some(path) = &args.database {
        builder = builder.set_override("database-path", path.as_str())?;
    }
    Ok(builder.build()?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,fjall=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = load_config(&args).context("loading configuration")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Cannot listen for ctrl-c: {e}");
            return;
        }
        info!("Shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    MarketplaceWatcher::run(&config, Arc::new(LoggingEventHandler), shutdown_rx).await
}
