use anyhow::Result;
use config::Config;
use nebula_common::{ChainPoint, PolicyId, ScriptHash};
use serde::Deserialize;

/// Contract and collections the watcher follows
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct MarketplaceConfig {
    pub script_hash: ScriptHash,
    pub bid_policy_id: PolicyId,
    /// Watched collection policy ids
    pub projects: Vec<PolicyId>,
    /// Seeds the checkpoint of a fresh database
    #[serde(default)]
    pub start_point: Option<ChainPoint>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WatcherConfig {
    pub node_address: String,
    pub magic_number: u64,
    pub database_path: String,
    pub fast_sync: bool,
    pub confirmations: u64,
    pub slots_per_block: u64,
    pub checkpoint_interval: u64,
    pub fast_sync_checkpoint_interval: u64,
    pub cleanup_margin_slots: u64,
    pub reconnect_delay_secs: u64,
    pub marketplace: MarketplaceConfig,
}

impl WatcherConfig {
    /// `config` over the module defaults
    pub fn layered(config: &Config) -> Result<Config> {
        Ok(Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config.default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(config.clone())
            .build()?)
    }

    pub fn try_load(config: &Config) -> Result<Self> {
        Ok(Self::layered(config)?.try_deserialize()?)
    }

    /// Blocks between two sync checkpoints
    pub fn effective_checkpoint_interval(&self) -> u64 {
        if self.fast_sync {
            self.fast_sync_checkpoint_interval
        } else {
            self.checkpoint_interval
        }
    }
}
