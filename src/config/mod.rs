// src/config/mod.rs
//! Service configuration: server/executor/transport/pool settings plus source groups.

pub mod sources;

pub use sources::{
    ConnectionKey, ConnectionTarget, GroupRegistry, Protocol, SourceDefinition, SourceGroup,
};

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::transport::RetryPolicy;

pub const ENV_CONFIG_PATH: &str = "AGGREGATOR_CONFIG_PATH";
pub const DEFAULT_TOML_PATH: &str = "config/aggregator.toml";
pub const DEFAULT_JSON_PATH: &str = "config/aggregator.json";

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_pool_size() -> usize {
    10
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    5000
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorSettings {
    /// Max sources dispatched at once across all aggregate calls.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchSettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl FetchSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Per-pool settings for DB sources.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawGroup {
    #[serde(default)]
    sources: Vec<SourceDefinition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    server: ServerSettings,
    #[serde(default)]
    executor: ExecutorSettings,
    #[serde(default)]
    fetch: FetchSettings,
    #[serde(default)]
    database: DatabaseSettings,
    #[serde(default)]
    soap_actions: HashMap<String, String>,
    #[serde(default)]
    groups: HashMap<String, RawGroup>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub executor: ExecutorSettings,
    pub fetch: FetchSettings,
    pub database: DatabaseSettings,
    pub soap_actions: HashMap<String, String>,
    pub groups: GroupRegistry,
}

impl AppConfig {
    /// Load from an explicit path. TOML or JSON, picked by extension.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading aggregator config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = if ext == "json" {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        };
        cfg.with_context(|| format!("parsing {}", path.display()))
    }

    /// Load using env var + fallbacks:
    /// 1) $AGGREGATOR_CONFIG_PATH
    /// 2) config/aggregator.toml
    /// 3) config/aggregator.json
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        for candidate in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
            let pb = PathBuf::from(candidate);
            if pb.exists() {
                return Self::load_from(&pb);
            }
        }
        bail!("no aggregator config found ({DEFAULT_TOML_PATH} or {DEFAULT_JSON_PATH})")
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(s)?;
        Self::from_raw(raw)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(s)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        if raw.executor.pool_size == 0 {
            bail!("executor.pool_size must be at least 1");
        }
        if raw.executor.pool_size > Semaphore::MAX_PERMITS {
            bail!(
                "executor.pool_size must be at most {}",
                Semaphore::MAX_PERMITS
            );
        }
        let mut groups = GroupRegistry::new();
        for (name, group) in raw.groups {
            groups.insert(SourceGroup::new(name, group.sources)?);
        }
        Ok(Self {
            server: raw.server,
            executor: raw.executor,
            fetch: raw.fetch,
            database: raw.database,
            soap_actions: raw.soap_actions,
            groups,
        })
    }
}
