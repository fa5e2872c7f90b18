//! Upstream HTTP client.
//!
//! The orchestrator only sees the [`UpstreamClient`] trait; the production
//! implementation is a pooled hyper client that speaks http and https.

use crate::config::ConnectionPoolConfig;
use crate::error::UpstreamError;
use crate::recording::HttpMethod;
use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper::{HeaderMap, Request};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Type alias for the HTTP client used by the proxy.
pub type HttpClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Outbound call made on a cache miss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    pub method: HttpMethod,
    pub url: String,
    pub timeout: Duration,
    /// URL-encoded form body (POST/PUT)
    pub form: Option<String>,
}

/// What the upstream answered.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError>;
}

/// Pooled hyper client with an http/https connector.
#[derive(Clone)]
pub struct HyperUpstreamClient {
    client: HttpClient,
}

impl HyperUpstreamClient {
    pub fn new(pool: &ConnectionPoolConfig) -> Result<Self, anyhow::Error> {
        let mut http_connector = HttpConnector::new();
        http_connector.set_keepalive(Some(Duration::from_secs(pool.keepalive_timeout_secs)));
        http_connector.set_connect_timeout(Some(Duration::from_secs(pool.connect_timeout_secs)));
        http_connector.enforce_http(false); // Allow both HTTP and HTTPS

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder = match hyper_rustls::HttpsConnectorBuilder::new()
            .with_provider_and_native_roots(Arc::clone(&provider))
        {
            Ok(builder) => builder,
            Err(e) => {
                warn!(
                    "No native root certificates available ({}); https upstreams will fail verification",
                    e
                );
                let tls_config = rustls::ClientConfig::builder_with_provider(provider)
                    .with_safe_default_protocol_versions()?
                    .with_root_certificates(rustls::RootCertStore::empty())
                    .with_no_client_auth();
                hyper_rustls::HttpsConnectorBuilder::new().with_tls_config(tls_config)
            }
        };
        let https_connector = builder
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(pool.idle_timeout_secs))
            .pool_max_idle_per_host(pool.max_idle_per_host)
            .build(https_connector);

        info!(
            "Connection pool configured (HTTP/1.1): max_idle={}, idle_timeout={}s, keepalive={}s",
            pool.max_idle_per_host, pool.idle_timeout_secs, pool.keepalive_timeout_secs
        );

        Ok(Self { client })
    }
}

#[async_trait]
impl UpstreamClient for HyperUpstreamClient {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> {
        let url = request.url.clone();
        let timeout = request.timeout;
        tokio::time::timeout(timeout, self.exchange(request))
            .await
            .unwrap_or(Err(UpstreamError::Timeout { url, timeout }))
    }
}

impl HyperUpstreamClient {
    /// Request plus full body collection.
    async fn exchange(&self, request: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> {
        let url = request.url;
        let uri: hyper::Uri = url.parse().map_err(|e: hyper::http::uri::InvalidUri| {
            UpstreamError::InvalidUrl {
                url: url.clone(),
                reason: e.to_string(),
            }
        })?;

        let mut builder = Request::builder().method(request.method.to_hyper()).uri(uri);
        let body = match request.form {
            Some(form) => {
                builder = builder.header(CONTENT_TYPE, FORM_CONTENT_TYPE);
                Full::new(Bytes::from(form))
            }
            None => Full::new(Bytes::new()),
        };
        let upstream_req = builder.body(body).map_err(|e| UpstreamError::InvalidUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        let response =
            self.client
                .request(upstream_req)
                .await
                .map_err(|e| UpstreamError::Transport {
                    url: url.clone(),
                    reason: e.to_string(),
                })?;

        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| UpstreamError::Transport {
                url: url.clone(),
                reason: format!("failed to read response body: {e}"),
            })?
            .to_bytes();

        Ok(UpstreamResponse {
            status: parts.status.as_u16(),
            headers: flatten_headers(&parts.headers),
            body,
        })
    }
}

/// Collapse a header map to name -> value, joining repeated headers with `, `.
pub fn flatten_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut flat: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        flat.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    flat
}
