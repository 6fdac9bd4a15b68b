//! Configuration for data stores and for the application around them.
//!
//! `DataStoreConfig` is the per-store TTL policy. `AppConfig` is the
//! application-wide configuration stored at
//! `~/.config/bookingcache/config.json`, with environment overrides.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::request::LOADING_DELAY;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "bookingcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const ENV_API_BASE_URL: &str = "BOOKINGCACHE_API_BASE_URL";
const ENV_CACHE_TTL_MS: &str = "BOOKINGCACHE_CACHE_TTL_MS";

/// TTL policy of one `DataStore`.
///
/// `cache_ttl: None` caches until an explicit `set`, `clear` or restart;
/// `Some(Duration::ZERO)` refetches on every non-refresh `get`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataStoreConfig {
    pub cache_ttl: Option<Duration>,
}

impl DataStoreConfig {
    pub fn forever() -> Self {
        Self { cache_ttl: None }
    }

    pub fn always_refetch() -> Self {
        Self::with_ttl(Duration::ZERO)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            cache_ttl: Some(ttl),
        }
    }

    pub fn from_millis(ttl_ms: Option<u64>) -> Self {
        Self {
            cache_ttl: ttl_ms.map(Duration::from_millis),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: Option<String>,
    /// Default TTL for stores; absent means cache until refreshed
    pub cache_ttl_ms: Option<u64>,
    pub loading_delay_ms: Option<u64>,
    /// Directory for the durable cache tier
    pub cache_dir: Option<PathBuf>,
    /// Directory for rolling log files; stderr only when absent
    pub log_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Environment wins over the file. `lookup` is `std::env::var` outside tests.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(ENV_API_BASE_URL) {
            self.api_base_url = Some(url);
        }
        if let Some(ttl) = lookup(ENV_CACHE_TTL_MS) {
            let ttl = ttl
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of milliseconds", ENV_CACHE_TTL_MS))?;
            self.cache_ttl_ms = Some(ttl);
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn store_config(&self) -> DataStoreConfig {
        DataStoreConfig::from_millis(self.cache_ttl_ms)
    }

    pub fn loading_delay(&self) -> Duration {
        self.loading_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(LOADING_DELAY)
    }
}
