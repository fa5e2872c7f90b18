//! Configuration types for mock-proxy.

mod listen;
mod mapping;
mod protocol;
mod upstream;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use listen::{ListenConfig, MetricsConfig};
pub use mapping::MappingConfig;
pub use protocol::Protocol;
pub use upstream::ConnectionPoolConfig;

/// Loaded once at startup and never reloaded.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub listen: ListenConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Root that relative mapping directories are resolved against.
    /// Defaults to the working directory.
    #[serde(default, alias = "DocRoot", skip_serializing_if = "Option::is_none")]
    pub doc_root: Option<PathBuf>,

    /// Upstream request timeout in milliseconds
    #[serde(default = "default_timeout_ms", alias = "Timeout")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub connection_pool: ConnectionPoolConfig,

    /// Route prefix -> mapping. Iterated in key order.
    #[serde(alias = "Mappings")]
    pub mappings: BTreeMap<String, MappingConfig>,
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, anyhow::Error> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.mappings.is_empty() {
            anyhow::bail!("At least one entry is required under 'mappings'");
        }

        for (key, mapping) in &self.mappings {
            mapping.validate(key).map_err(|e| anyhow::anyhow!(e))?;
        }

        if self.timeout_ms == 0 {
            anyhow::bail!("'timeoutMs' must be greater than zero");
        }

        if self.metrics.enabled && self.metrics.port == self.listen.port {
            anyhow::bail!(
                "Metrics port {} collides with the listen port",
                self.metrics.port
            );
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Absolute document root.
    pub fn document_root(&self) -> Result<PathBuf, anyhow::Error> {
        let root = match &self.doc_root {
            Some(root) => root.clone(),
            None => std::env::current_dir()?,
        };
        Ok(std::path::absolute(root)?)
    }
}
