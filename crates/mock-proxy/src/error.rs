//! Error types for request handling.
//!
//! Every variant is recovered at the proxy boundary and turned into an opaque
//! reply; the detailed message only ever reaches the logs.

use std::path::PathBuf;
use std::time::Duration;

use hyper::StatusCode;

/// Failure while talking to the real upstream API.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("invalid upstream url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("upstream request to '{url}' failed: {reason}")]
    Transport { url: String, reason: String },
    #[error("upstream '{url}' did not respond within {timeout:?}")]
    Timeout { url: String, timeout: Duration },
    #[error("upstream '{url}' responded with status {status}")]
    Status { url: String, status: u16 },
}

/// Failure in the file-backed response cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("no cache path can be derived for mapping '{0}'")]
    NoPath(String),
    #[error("failed to read cache entry {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write cache entry {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cache entry {path:?} is not a valid response record: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Terminal failure of a proxied request.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("no mapping configured for '{0}'")]
    UnmappedRequest(String),
    #[error("method {0} is not supported")]
    UnsupportedMethod(String),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl ProxyError {
    /// Status code reported to the caller.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::UnmappedRequest(_) => StatusCode::NOT_FOUND,
            ProxyError::UnsupportedMethod(_) => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::Upstream(_) | ProxyError::Cache(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used for metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            ProxyError::UnmappedRequest(_) => "unmapped",
            ProxyError::UnsupportedMethod(_) => "unsupported_method",
            ProxyError::Upstream(_) => "upstream_error",
            ProxyError::Cache(CacheError::Write { .. }) => "cache_write_error",
            ProxyError::Cache(CacheError::NoPath(_)) => "no_path",
            ProxyError::Cache(_) => "cache_read_error",
        }
    }
}
