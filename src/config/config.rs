// SPDX-License-Identifier: GPL-3.0-only
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::sync::RetryPolicies;

const ENV_PREFIX: &str = "RECIPE_SYNC_";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote record store base URL; empty runs against an in-process store
    pub backend_api_url: String,

    /// Optional bearer token for the remote store
    pub backend_api_key: Option<String>,

    /// Local view-state API bind address (e.g., "127.0.0.1:8080")
    pub local_api_bind: SocketAddr,

    /// SQLite database for locally persisted settings
    pub settings_db_path: PathBuf,

    /// Directory for locally cached blobs such as profile photos
    pub blob_dir: PathBuf,

    /// Records requested per query page
    pub query_page_size: usize,

    /// How often subscriptions poll the remote store, in seconds
    pub subscription_poll_secs: u64,

    /// Pending fire-and-forget jobs before new ones are dropped
    pub background_queue_capacity: usize,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,

    pub retry: RetryPolicies,
}

impl Config {
    /// Load configuration from TOML file with environment variable overrides
    pub fn load() -> anyhow::Result<Self> {
        let config_path = std::env::var("RECIPE_SYNC_CONFIG")
            .unwrap_or_else(|_| "config.toml".to_string());

        let mut config = Self::load_file(Path::new(&config_path))?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Parse `path`, falling back to defaults when it does not exist.
    pub fn load_file(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Apply `RECIPE_SYNC_*` overrides resolved through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(val) = var("BACKEND_API_URL") {
            self.backend_api_url = val;
        }
        if let Some(val) = var("BACKEND_API_KEY") {
            self.backend_api_key = Some(val).filter(|key| !key.is_empty());
        }
        if let Some(val) = var("LOCAL_API_BIND") {
            self.local_api_bind = SocketAddr::from_str(&val)
                .with_context(|| format!("Invalid {}LOCAL_API_BIND: {}", ENV_PREFIX, val))?;
        }
        if let Some(val) = var("SETTINGS_DB_PATH") {
            self.settings_db_path = PathBuf::from(val);
        }
        if let Some(val) = var("BLOB_DIR") {
            self.blob_dir = PathBuf::from(val);
        }
        if let Some(val) = var("QUERY_PAGE_SIZE") {
            self.query_page_size = val
                .parse()
                .with_context(|| format!("Invalid {}QUERY_PAGE_SIZE: {}", ENV_PREFIX, val))?;
        }
        if let Some(val) = var("SUBSCRIPTION_POLL_SECS") {
            self.subscription_poll_secs = val
                .parse()
                .with_context(|| format!("Invalid {}SUBSCRIPTION_POLL_SECS: {}", ENV_PREFIX, val))?;
        }
        if let Some(val) = var("BACKGROUND_QUEUE_CAPACITY") {
            self.background_queue_capacity = val.parse().with_context(|| {
                format!("Invalid {}BACKGROUND_QUEUE_CAPACITY: {}", ENV_PREFIX, val)
            })?;
        }
        if let Some(val) = var("LOG_LEVEL") {
            self.log_level = val;
        }

        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.query_page_size == 0 {
            return Err(anyhow::anyhow!("query_page_size must be greater than zero"));
        }
        if self.subscription_poll_secs == 0 {
            return Err(anyhow::anyhow!("subscription_poll_secs must be greater than zero"));
        }
        if self.background_queue_capacity == 0 {
            return Err(anyhow::anyhow!("background_queue_capacity must be greater than zero"));
        }
        self.retry.validate()
    }

    /// Whether to run against the in-process record store.
    pub fn uses_memory_store(&self) -> bool {
        self.backend_api_url.trim().is_empty()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_api_url: String::from("http://localhost:3000/api"),
            backend_api_key: None,
            local_api_bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            settings_db_path: PathBuf::from("settings.db"),
            blob_dir: PathBuf::from("blobs"),
            query_page_size: 100,
            subscription_poll_secs: 30,
            background_queue_capacity: 256,
            log_level: String::from("info"),
            retry: RetryPolicies::default(),
        }
    }
}
