//! Configuration management
//!
//! Reads the operator-filter settings from a TOML file, then applies
//! environment overrides (a `.env` file is loaded first if present).
//!
//! Example:
//! ```toml
//! [general]
//! log_level = "info"
//! cache_ttl_secs = 86400
//!
//! [storage]
//! database_url = "sqlite:operator_filter.db?mode=rwc"
//! redis_url = "redis://127.0.0.1/"
//!
//! [networks.mainnet]
//! chain_id = 1
//! rpc_url = "https://eth.llamarpc.com"
//! registries = ["0x000000000000AAeB6D7670E522A718067333cd4E"]
//!
//! [[static_rules]]
//! chain_id = 1
//! contract = "0x..."
//! operators = []
//! reason = "collection refuses all marketplaces"
//! ```
//!
//! Created: 2026-10-18

use crate::filters::StaticRule;
use alloy::primitives::Address;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Top-level TOML configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub networks: HashMap<String, NetworkConfig>,
    #[serde(default)]
    pub static_rules: Vec<StaticRule>,
}

/// General settings
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

/// Durable store and fast cache locations
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// When unset an in-process cache is used
    #[serde(default)]
    pub redis_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            redis_url: None,
        }
    }
}

/// Chain-specific settings, keyed by network name in the config file
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub rpc_url: String,
    /// Operator-filter registries consulted for every collection on this network
    pub registries: Vec<Address>,
}

fn default_log_level() -> String { "info".to_string() }
fn default_cache_ttl() -> u64 { 24 * 60 * 60 }
fn default_database_url() -> String { "sqlite:operator_filter.db?mode=rwc".to_string() }

impl FilterConfig {
    /// Load configuration from a TOML file, then apply environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        dotenv::dotenv().ok();

        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let mut config = Self::from_toml(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration without touching the filesystem or environment.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).with_context(|| "Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.networks.is_empty() {
            return Err(anyhow!("No networks configured"));
        }
        for (name, network) in &self.networks {
            if network.registries.is_empty() {
                return Err(anyhow!("Network '{}' lists no operator-filter registries", name));
            }
        }
        Ok(())
    }

    /// `DATABASE_URL` and `REDIS_URL` replace the storage settings;
    /// `RPC_URL` replaces the endpoint of every configured network.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.storage.database_url = url;
        }
        if let Ok(url) = std::env::var("REDIS_URL") {
            self.storage.redis_url = Some(url);
        }
        if let Ok(url) = std::env::var("RPC_URL") {
            for network in self.networks.values_mut() {
                network.rpc_url = url.clone();
            }
        }
    }

    /// Look up a network by name (case-insensitive).
    pub fn network(&self, name: &str) -> Result<&NetworkConfig> {
        let wanted = name.to_lowercase();
        self.networks
            .iter()
            .find(|(key, _)| key.to_lowercase() == wanted)
            .map(|(_, network)| network)
            .ok_or_else(|| {
                let mut known: Vec<&str> = self.networks.keys().map(String::as_str).collect();
                known.sort_unstable();
                anyhow!("Unsupported network: '{}'. Configured: {}", name, known.join(", "))
            })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.general.cache_ttl_secs)
    }
}
