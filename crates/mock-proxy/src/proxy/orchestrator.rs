//! Record/replay decision for a single request.
//!
//! resolve mapping -> derive cache key -> read cache
//!   hit  -> replay
//!   miss -> call upstream -> (2xx) write cache -> reply
//!                         -> (error / non-2xx) fail, nothing written
//!
//! The reply for a recorded response is only produced after its cache write
//! has finished, so a successful reply implies the entry is on disk.

use super::client::{UpstreamClient, UpstreamRequest, UpstreamResponse};
use crate::error::{ProxyError, UpstreamError};
use crate::metrics;
use crate::recording::{encode_form, is_success_status, RequestDescriptor, ResponseCache, ResponseRecord};
use crate::routing::MappingResolver;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Where a reply came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    Cache,
    Upstream,
}

impl ServedFrom {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServedFrom::Cache => "cache",
            ServedFrom::Upstream => "upstream",
        }
    }
}

/// Successful terminal state.
#[derive(Debug, Clone, PartialEq)]
pub struct Served {
    pub record: ResponseRecord,
    pub source: ServedFrom,
}

pub struct ProxyOrchestrator<C> {
    resolver: Arc<MappingResolver>,
    cache: ResponseCache,
    client: C,
    timeout: Duration,
}

impl<C: UpstreamClient> ProxyOrchestrator<C> {
    pub fn new(
        resolver: Arc<MappingResolver>,
        cache: ResponseCache,
        client: C,
        timeout: Duration,
    ) -> Self {
        Self {
            resolver,
            cache,
            client,
            timeout,
        }
    }

    pub fn resolver(&self) -> &MappingResolver {
        &self.resolver
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Serve `request` from the cache, or record it from upstream.
    pub async fn handle(&self, request: &RequestDescriptor) -> Result<Served, ProxyError> {
        let method = request.method.as_str();
        let result = self.handle_inner(request).await;
        match &result {
            Ok(served) => {
                let outcome = match served.source {
                    ServedFrom::Cache => "cache_hit",
                    ServedFrom::Upstream => "recorded",
                };
                metrics::record_request(method, outcome);
            }
            Err(e) => metrics::record_request(method, e.outcome()),
        }
        result
    }

    async fn handle_inner(&self, request: &RequestDescriptor) -> Result<Served, ProxyError> {
        let resolved = self
            .resolver
            .resolve(&request.raw_path)
            .ok_or_else(|| ProxyError::UnmappedRequest(request.raw_path.clone()))?;

        let cache_path = self.cache.path_for(&resolved, request)?;

        if let Some(raw) = self.cache.read(&cache_path).await? {
            let record = ResponseRecord::from_slice(&raw, &cache_path)?;
            debug!(
                "Replaying {} {} from {:?} (status: {})",
                request.method, request.raw_path, cache_path, record.code
            );
            return Ok(Served {
                record,
                source: ServedFrom::Cache,
            });
        }

        let upstream_request = UpstreamRequest {
            method: request.method,
            url: resolved.upstream_url(&request.raw_path),
            timeout: self.timeout,
            form: request
                .method
                .carries_body()
                .then(|| encode_form(&request.body)),
        };
        debug!(
            "Cache miss for {} {}, forwarding to {}",
            request.method, request.raw_path, upstream_request.url
        );

        let response = self.call_upstream(upstream_request).await?;

        let record = ResponseRecord::new(
            response.status,
            response.headers,
            String::from_utf8_lossy(&response.body),
        );

        let write_result = self.cache.write(&cache_path, &record).await;
        metrics::record_cache_write(write_result.is_ok());
        if let Err(e) = write_result {
            error!("Upstream call succeeded but recording failed: {}", e);
            return Err(e.into());
        }

        info!(
            "Recorded {} {} -> {:?} (status: {})",
            request.method, request.raw_path, cache_path, record.code
        );
        Ok(Served {
            record,
            source: ServedFrom::Upstream,
        })
    }

    /// Issue the upstream call under the configured timeout, whatever the
    /// client does with it; only 2xx passes.
    async fn call_upstream(
        &self,
        request: UpstreamRequest,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let method = request.method.as_str();
        let url = request.url.clone();
        let start = Instant::now();

        let result = match tokio::time::timeout(self.timeout, self.client.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Timeout {
                url: url.clone(),
                timeout: self.timeout,
            }),
        };

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        let status_label = match &result {
            Ok(response) => response.status.to_string(),
            Err(_) => "error".to_string(),
        };
        metrics::record_upstream_duration(method, &status_label, duration_ms);

        let response = result.inspect_err(|e| warn!("Upstream request failed: {}", e))?;
        if !is_success_status(response.status) {
            warn!(
                "Upstream {} answered {}, response not recorded",
                url, response.status
            );
            return Err(UpstreamError::Status {
                url,
                status: response.status,
            });
        }
        Ok(response)
    }
}
