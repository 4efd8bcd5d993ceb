//! Nebula marketplace watcher: classifies marketplace transactions of every
//! block the node hands us and keeps the projection store in step with the
//! chain, rollbacks included.

pub mod chain_sync;
pub mod classifier;
pub mod configuration;
pub mod controller;

#[cfg(test)]
mod fixtures;

use std::sync::Arc;

use anyhow::{Context, Result};
use config::Config;
use nebula_common::EventHandler;
use nebula_module_projection_store::{FjallStore, MarketplaceDb};
use tokio::sync::watch;
use tracing::info;

use crate::chain_sync::ChainSyncSettings;
use crate::classifier::Classifier;
use crate::configuration::WatcherConfig;
use crate::controller::{ChainController, ControllerSettings};

pub struct MarketplaceWatcher;

impl MarketplaceWatcher {
    /// Opens the projection named by `config` and follows the chain into it
    /// until `shutdown` flips to true.
    pub async fn run(
        config: &Config,
        handler: Arc<dyn EventHandler>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let watcher_config =
            WatcherConfig::try_load(config).context("invalid watcher configuration")?;

        info!(
            script_hash = %watcher_config.marketplace.script_hash,
            bid_policy_id = %watcher_config.marketplace.bid_policy_id,
            projects = watcher_config.marketplace.projects.len(),
            fast_sync = watcher_config.fast_sync,
            "Starting marketplace watcher"
        );

        let store = FjallStore::open(&watcher_config.database_path)
            .with_context(|| format!("opening {}", watcher_config.database_path))?;
        let db = MarketplaceDb::open(store, watcher_config.marketplace.start_point)?;

        let mut controller = ChainController::new(
            db,
            Classifier::new(watcher_config.marketplace.clone()),
            handler,
            ControllerSettings::from(&watcher_config),
        );

        chain_sync::run(&mut controller, &ChainSyncSettings::from(&watcher_config), shutdown).await
    }
}
