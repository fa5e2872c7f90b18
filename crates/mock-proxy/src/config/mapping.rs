//! Mapping table entries: route prefix to upstream host and cache directory.

use super::protocol::Protocol;
use serde::{Deserialize, Serialize};

/// One entry of the `mappings` table, keyed by the route prefix.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingConfig {
    /// Directory holding this mapping's recorded responses
    /// (absolute, or relative to the document root)
    pub dir: String,
    /// Base URL of the real API
    pub host: String,
    /// Leave request headers out of cache key derivation
    #[serde(default)]
    pub skip_headers: bool,
}

impl MappingConfig {
    /// Validate a single mapping entry registered under `key`
    pub fn validate(&self, key: &str) -> Result<(), String> {
        if key.is_empty() {
            return Err("Mapping keys must not be empty".to_string());
        }
        if key.contains('/') {
            return Err(format!(
                "Mapping key '{key}' must be a single path segment (no '/')"
            ));
        }
        if self.dir.trim().is_empty() {
            return Err(format!("Mapping '{key}' has an empty 'dir'"));
        }
        Protocol::from_url(&self.host).map_err(|e| format!("Mapping '{key}': {e}"))?;
        Ok(())
    }
}
