use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::feed::DEFAULT_RECENT_LIMIT;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub version: u32,
    pub database: Database,
    pub catalog: CatalogSource,
    pub http: HttpConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    pub public_endpoint: Option<PublicEndpoint>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.to_string_lossy()))?;
        toml::from_str(&contents).with_context(|| "Failed to parse config TOML")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub bind_addr: String,
    pub port: u16,
}

/// Where track stats are kept
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Database {
    InMemory,
    Json { path: PathBuf },
    Sqlite { path: PathBuf },
}

/// The uploads catalog, a JSON array of track records
#[derive(Debug, Deserialize, Clone)]
pub struct CatalogSource {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            recent_limit: DEFAULT_RECENT_LIMIT,
        }
    }
}

fn default_recent_limit() -> usize {
    DEFAULT_RECENT_LIMIT
}

/// Base url clients use to reach uploaded media
#[derive(Debug, Deserialize, Clone)]
pub struct PublicEndpoint {
    pub base_url: String,
}
