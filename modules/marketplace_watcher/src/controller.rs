//! Applies roll-forward and roll-backward instructions to the projection

use std::sync::Arc;

use anyhow::{Context, Result};
use nebula_common::{Block, ChainPoint, CheckpointKind, EventHandler, Point, Transaction};
use nebula_module_projection_store::{MarketplaceDb, Store};
use tracing::{debug, info, warn};

use crate::classifier::{ClassifyError, Classifier};
use crate::configuration::WatcherConfig;

/// Pacing of the controller's periodic work
#[derive(Debug, Clone, Copy)]
pub struct ControllerSettings {
    /// No event delivery and no compaction
    pub fast_sync: bool,
    pub confirmations: u64,
    pub slots_per_block: u64,
    pub checkpoint_interval: u64,
    pub cleanup_margin_slots: u64,
}

impl From<&WatcherConfig> for ControllerSettings {
    fn from(config: &WatcherConfig) -> Self {
        Self {
            fast_sync: config.fast_sync,
            confirmations: config.confirmations,
            slots_per_block: config.slots_per_block,
            checkpoint_interval: config.effective_checkpoint_interval().max(1),
            cleanup_margin_slots: config.cleanup_margin_slots,
        }
    }
}

pub struct ChainController<S: Store> {
    db: MarketplaceDb<S>,
    classifier: Classifier,
    handler: Arc<dyn EventHandler>,
    settings: ControllerSettings,
    /// Last block applied and whether its point is already the sync point
    last_block: Option<(ChainPoint, bool)>,
}

impl<S: Store> ChainController<S> {
    pub fn new(
        db: MarketplaceDb<S>,
        classifier: Classifier,
        handler: Arc<dyn EventHandler>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            db,
            classifier,
            handler,
            settings,
            last_block: None,
        }
    }

    pub fn db(&self) -> &MarketplaceDb<S> {
        &self.db
    }

    /// Where the follower should intersect. `None` means the current tip.
    pub fn resume_point(&self) -> Result<Option<Point>> {
        Ok(self.db.checkpoint()?.sync_point)
    }

    pub async fn roll_forward(&mut self, block: &Block) -> Result<()> {
        let point = block.point;
        for tx in &block.transactions {
            self.apply_transaction(tx, &point)
                .with_context(|| format!("applying tx {} in block {point}", tx.hash))?;
        }

        if !self.settings.fast_sync {
            let delivered = self
                .db
                .trigger_events(
                    &point,
                    self.settings.confirmations,
                    self.settings.slots_per_block,
                    self.handler.as_ref(),
                )
                .await?;
            if delivered > 0 {
                debug!(delivered, slot = point.slot, "Delivered events");
            }
        }

        let at_interval = block.number % self.settings.checkpoint_interval == 0;
        if at_interval && !self.settings.fast_sync {
            self.db.cleanup_database(self.settings.cleanup_margin_slots)?;
        }
        if at_interval {
            self.db.update_checkpoint(CheckpointKind::Sync, point.into())?;
        }
        self.last_block = Some((point, at_interval));

        self.notify_change().await;
        Ok(())
    }

    pub async fn roll_backward(&mut self, point: &Point) -> Result<()> {
        info!(%point, "Rolling back");
        self.db.rollback_database(point)?;
        self.last_block = point.as_chain_point().map(|p| (*p, true));
        self.notify_change().await;
        Ok(())
    }

    /// Persists the position of the last applied block before shutdown
    pub async fn finish(&mut self) -> Result<()> {
        if let Some((point, false)) = self.last_block {
            self.db.update_checkpoint(CheckpointKind::Sync, point.into())?;
            self.last_block = Some((point, true));
            self.notify_change().await;
        }
        Ok(())
    }

    /// Spends first, so a transaction that closes one order and opens another
    /// at the same script sees both.
    fn apply_transaction(&mut self, tx: &Transaction, point: &ChainPoint) -> Result<()> {
        for redeemer in &tx.redeemers {
            match self.classifier.classify_redeemer(tx, redeemer, point, &self.db) {
                Ok(Some(record)) => self.db.record(record)?,
                Ok(None) => {}
                Err(ClassifyError::Store(e)) => return Err(e.into()),
                Err(e) => warn!(tx = %tx.hash, "Skipping redeemer {}: {e}", redeemer.index),
            }
        }

        for index in 0..tx.outputs.len() {
            match self.classifier.classify_output(tx, index, point) {
                Ok(Some(record)) => self.db.record(record)?,
                Ok(None) => {}
                Err(ClassifyError::Store(e)) => return Err(e.into()),
                Err(e) => warn!(tx = %tx.hash, "Skipping output {index}: {e}"),
            }
        }
        Ok(())
    }

    async fn notify_change(&mut self) {
        if self.db.has_changed() {
            self.handler.on_change().await;
        }
    }
}
