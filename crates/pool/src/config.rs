use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::Result;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PoolConfig {
    #[serde(default = "default_store_path")]
    #[serde(rename = "store-path")]
    pub store_path: String,
    #[serde(default = "default_poll_interval_ms")]
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_wait_timeout_secs")]
    #[serde(rename = "wait-timeout-secs")]
    pub wait_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            store_path: default_store_path(),
            poll_interval_ms: default_poll_interval_ms(),
            wait_timeout_secs: default_wait_timeout_secs(),
        }
    }
}

fn default_store_path() -> String {
    "/var/lib/basin/pools.db".to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_wait_timeout_secs() -> u64 {
    30
}

impl PoolConfig {
    pub async fn load(path: &Path) -> Result<PoolConfig> {
        if path.exists() {
            let content = fs::read_to_string(path).await?;
            let config: PoolConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(PoolConfig::default())
        }
    }
}
