//! Chain follower over the node-to-node chainsync and blockfetch protocols

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use nebula_codec::{header_point, map_block};
use nebula_common::{BlockHash, ChainPoint, Point};
use nebula_module_projection_store::Store;
use pallas::network::{
    facades::PeerClient,
    miniprotocols::{
        chainsync::{NextResponse, Tip},
        Point as PallasPoint,
    },
};
use thiserror::Error;
use tokio::{select, sync::watch};
use tracing::{debug, error, info, instrument};

use crate::configuration::WatcherConfig;
use crate::controller::ChainController;

#[derive(Debug, Clone)]
pub struct ChainSyncSettings {
    pub node_address: String,
    pub magic_number: u64,
    pub reconnect_delay: Duration,
}

impl From<&WatcherConfig> for ChainSyncSettings {
    fn from(config: &WatcherConfig) -> Self {
        Self {
            node_address: config.node_address.clone(),
            magic_number: config.magic_number,
            reconnect_delay: Duration::from_secs(config.reconnect_delay_secs),
        }
    }
}

pub fn to_pallas_point(point: &Point) -> PallasPoint {
    match point {
        Point::Origin => PallasPoint::Origin,
        Point::Specific(p) => PallasPoint::Specific(p.slot, p.hash.to_vec()),
    }
}

pub fn from_pallas_point(point: &PallasPoint) -> Result<Point> {
    match point {
        PallasPoint::Origin => Ok(Point::Origin),
        PallasPoint::Specific(slot, hash) => {
            let hash = BlockHash::try_from(hash.as_slice())
                .map_err(|e| anyhow!("bad block hash at slot {slot}: {e}"))?;
            Ok(Point::Specific(ChainPoint::new(hash, *slot)))
        }
    }
}

/// Failure of one connection attempt. Only transport failures are retried.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("node connection failed: {0:#}")]
    Transport(anyhow::Error),

    #[error("projection update failed: {0:#}")]
    Projection(anyhow::Error),
}

impl SyncError {
    fn transport<E: Into<anyhow::Error>>(error: E) -> Self {
        SyncError::Transport(error.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Transport(_))
    }
}

fn shutdown_requested(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

/// Follows the chain until `shutdown` flips, reconnecting after transport
/// failures from the last durable checkpoint. Projection failures end the run.
pub async fn run<S: Store>(
    controller: &mut ChainController<S>,
    settings: &ChainSyncSettings,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    while !shutdown_requested(&shutdown) {
        match follow(controller, settings, &mut shutdown).await {
            Ok(()) => break,
            Err(e) if !e.is_transient() => {
                return Err(anyhow::Error::new(e).context("stopping chain sync"));
            }
            Err(e) => {
                error!("Chain sync with {} failed: {e}", settings.node_address);
                debug!("Reconnecting in {:?}", settings.reconnect_delay);
                select! {
                    _ = tokio::time::sleep(settings.reconnect_delay) => {}
                    Ok(()) = shutdown.changed() => {}
                }
            }
        }
    }

    controller.finish().await.context("persisting final checkpoint")?;
    info!("Chain sync stopped");
    Ok(())
}

#[instrument(skip_all, fields(address = %settings.node_address))]
async fn follow<S: Store>(
    controller: &mut ChainController<S>,
    settings: &ChainSyncSettings,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<(), SyncError> {
    info!("Connecting to {} ({})", settings.node_address, settings.magic_number);
    let mut peer = PeerClient::connect(settings.node_address.as_str(), settings.magic_number)
        .await
        .context("could not connect")
        .map_err(SyncError::Transport)?;

    let start = match controller.resume_point().map_err(SyncError::Projection)? {
        Some(point) => to_pallas_point(&point),
        None => {
            // Ask for origin but get the tip as well
            let (_, Tip(tip, _)) = peer
                .chainsync()
                .find_intersect(vec![PallasPoint::Origin])
                .await
                .map_err(SyncError::transport)?;
            tip
        }
    };

    let slot = start.slot_or_default();
    info!("Synchronising from slot {slot}");
    let (intersection, _) =
        peer.chainsync().find_intersect(vec![start]).await.map_err(SyncError::transport)?;
    let intersection = intersection.ok_or_else(|| {
        SyncError::Transport(anyhow!("Intersection for slot {slot} not found"))
    })?;

    let mut first_response = true;
    loop {
        let next = select! {
            next = peer.chainsync().request_or_await_next() => next.map_err(SyncError::transport)?,
            Ok(()) = shutdown.changed() => return Ok(()),
        };

        match next {
            NextResponse::RollForward(header, _) => {
                let point = match header_point(&header) {
                    Ok(point) => point,
                    Err(e) => {
                        debug!("Skipping header: {e}");
                        first_response = false;
                        continue;
                    }
                };
                let body = peer
                    .blockfetch()
                    .fetch_single(PallasPoint::Specific(point.slot, point.hash.to_vec()))
                    .await
                    .with_context(|| format!("fetching block {point}"))
                    .map_err(SyncError::Transport)?;
                let block = map_block(&body)
                    .with_context(|| format!("decoding block {point}"))
                    .map_err(SyncError::Transport)?;
                if block.point != point {
                    return Err(SyncError::Transport(anyhow!(
                        "fetched block {} instead of {point}",
                        block.point
                    )));
                }
                controller.roll_forward(&block).await.map_err(SyncError::Projection)?;
            }

            // The first response after an intersection restates it
            NextResponse::RollBackward(point, _) if first_response && point == intersection => {}

            NextResponse::RollBackward(point, _) => {
                let point = from_pallas_point(&point).map_err(SyncError::Transport)?;
                controller.roll_backward(&point).await.map_err(SyncError::Projection)?;
            }

            NextResponse::Await => debug!("At tip, awaiting next block"),
        }
        first_response = false;

        if shutdown_requested(shutdown) {
            return Ok(());
        }
    }
}
