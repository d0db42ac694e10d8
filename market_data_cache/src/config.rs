//! Runtime configuration for the cache.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::errors::Error;

/// Configuration for a cache instance, loadable from a TOML file.
///
/// Every field has a default matching the reference behavior, so a config
/// file only needs to override what differs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Root directory for the raw and processed data trees.
    pub base_dir: PathBuf,

    /// Provider endpoint for per-year archive downloads.
    pub endpoint: String,

    /// Optional allow-list file of validated identifiers, one per line.
    pub validated_ids_file: Option<PathBuf>,

    /// Worker-pool bound for batch fetches.
    pub concurrency: usize,

    /// Maximum retries after a rate-limit response before surfacing an error.
    pub max_rate_limit_retries: u32,

    /// Base delay for the exponential rate-limit backoff, in seconds.
    pub backoff_base_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("market_data"),
            endpoint: "https://invest-public-api.tinkoff.ru/history-data".to_string(),
            validated_ids_file: None,
            concurrency: 5,
            max_rate_limit_retries: 3,
            backoff_base_secs: 5,
        }
    }
}

impl CacheConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("read {}: {e}", path.display())))?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("parse {}: {e}", path.display())))
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_secs(self.backoff_base_secs)
    }
}
