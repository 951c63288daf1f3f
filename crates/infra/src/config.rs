//! Marketplace configuration.
//!
//! Loaded from an optional TOML file (`KUDIMALL_CONFIG`), then overridden by
//! `KUDIMALL_*` environment variables. Missing values fall back to defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use kudimall_inventory::DEFAULT_LOW_STOCK_THRESHOLD;

pub const CONFIG_PATH_ENV: &str = "KUDIMALL_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketplaceConfig {
    #[serde(default)]
    pub inventory: InventoryConfig,

    #[serde(default)]
    pub promotion: PromotionConfig,

    #[serde(default)]
    pub server: ServerConfig,

    /// Postgres connection string. Unset means in-memory storage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Attempts per decrement before a lost compare-and-swap surfaces.
    #[serde(default = "default_max_stock_retries")]
    pub max_stock_retries: u32,

    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: i64,
}

fn default_max_stock_retries() -> u32 {
    32
}

fn default_low_stock_threshold() -> i64 {
    DEFAULT_LOW_STOCK_THRESHOLD
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            max_stock_retries: default_max_stock_retries(),
            low_stock_threshold: default_low_stock_threshold(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionConfig {
    /// Initial featured-slot cap, seeded into the store at startup when set.
    #[serde(default)]
    pub max_boosted_products: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

impl MarketplaceConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML config")
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path))
    }

    /// Load from `KUDIMALL_CONFIG` (if set) and the process environment.
    pub fn load() -> Result<Self> {
        let config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides, reading variables through `lookup`.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("KUDIMALL_MAX_STOCK_RETRIES") {
            self.inventory.max_stock_retries = raw
                .trim()
                .parse()
                .with_context(|| format!("invalid KUDIMALL_MAX_STOCK_RETRIES: {raw}"))?;
        }
        if let Some(raw) = lookup("KUDIMALL_LOW_STOCK_THRESHOLD") {
            self.inventory.low_stock_threshold = raw
                .trim()
                .parse()
                .with_context(|| format!("invalid KUDIMALL_LOW_STOCK_THRESHOLD: {raw}"))?;
        }
        if let Some(raw) = lookup("KUDIMALL_MAX_BOOSTED_PRODUCTS") {
            let raw = raw.trim();
            self.promotion.max_boosted_products = if raw.is_empty() || raw == "none" {
                None
            } else {
                Some(
                    raw.parse()
                        .with_context(|| format!("invalid KUDIMALL_MAX_BOOSTED_PRODUCTS: {raw}"))?,
                )
            };
        }
        if let Some(addr) = lookup("KUDIMALL_BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Some(url) = lookup("KUDIMALL_DATABASE_URL").or_else(|| lookup("DATABASE_URL")) {
            if !url.trim().is_empty() {
                self.database_url = Some(url);
            }
        }

        if self.inventory.max_stock_retries == 0 {
            anyhow::bail!("inventory.max_stock_retries must be at least 1");
        }
        Ok(self)
    }
}
