//! ProxyServer struct and main run loop.
//!
//! Accepts connections on the configured listener and serves each on its own
//! task; an optional second listener exposes Prometheus metrics.

use super::client::HyperUpstreamClient;
use super::forwarding::error_response;
use super::handler::handle_request;
use super::orchestrator::ProxyOrchestrator;
use crate::config::Config;
use crate::metrics::collect_metrics;
use crate::recording::ResponseCache;
use crate::routing::MappingResolver;
use anyhow::Context;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// The main proxy server struct.
pub struct ProxyServer {
    config: Arc<Config>,
    orchestrator: Arc<ProxyOrchestrator<HyperUpstreamClient>>,
}

impl ProxyServer {
    /// Create a new ProxyServer from validated configuration.
    pub fn new(config: Config) -> Result<Self, anyhow::Error> {
        let doc_root = config.document_root()?;
        let resolver = Arc::new(MappingResolver::from_config(&config.mappings));
        let client = HyperUpstreamClient::new(&config.connection_pool)?;
        let orchestrator = ProxyOrchestrator::new(
            resolver,
            ResponseCache::new(doc_root),
            client,
            config.timeout(),
        );

        Ok(Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
        })
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, anyhow::Error> {
        socket_addr(&self.config.listen.host, self.config.listen.port)
    }

    /// Bind the configured listeners and serve until Ctrl-C.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let addr = self.listen_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind proxy listener on {addr}"))?;

        if self.config.metrics.enabled {
            let metrics_addr = socket_addr(&self.config.listen.host, self.config.metrics.port)?;
            let metrics_listener = TcpListener::bind(metrics_addr)
                .await
                .with_context(|| format!("Failed to bind metrics listener on {metrics_addr}"))?;
            info!("Metrics available on http://{}/metrics", metrics_addr);
            tokio::spawn(async move {
                if let Err(e) = serve_metrics(metrics_listener).await {
                    error!("Metrics listener stopped: {}", e);
                }
            });
        }

        self.serve(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Accept connections on `listener` until `shutdown` resolves.
    ///
    /// Connections already accepted keep running on their own tasks.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), anyhow::Error>
    where
        F: Future<Output = ()>,
    {
        info!(
            "Listening on http://{}",
            listener.local_addr().context("Listener has no local address")?
        );
        info!(
            "Serving {} mapping(s) from {:?}",
            self.orchestrator.resolver().mappings().len(),
            self.orchestrator.cache().doc_root()
        );
        for mapping in self.orchestrator.resolver().mappings() {
            info!(
                "  /{} -> {} (dir: {:?}, skipHeaders: {})",
                mapping.key, mapping.host, mapping.dir, mapping.skip_headers
            );
        }

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, remote_addr) = accepted?;
                    let orchestrator = Arc::clone(&self.orchestrator);

                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let service = service_fn(move |req| {
                            let orchestrator = Arc::clone(&orchestrator);
                            async move { handle_request(&*orchestrator, req).await }
                        });

                        if let Err(err) = http1::Builder::new().serve_connection(io, service).await
                        {
                            error!(
                                "Error serving HTTP connection from {}: {}",
                                remote_addr, err
                            );
                        }
                    });
                }
                _ = &mut shutdown => {
                    info!("Shutdown signal received, no longer accepting connections");
                    return Ok(());
                }
            }
        }
    }
}

fn socket_addr(host: &str, port: u16) -> Result<SocketAddr, anyhow::Error> {
    format!("{host}:{port}")
        .parse::<SocketAddr>()
        .or_else(|_| format!("[{host}]:{port}").parse::<SocketAddr>())
        .with_context(|| format!("Invalid listen address {host}:{port}"))
}

async fn serve_metrics(listener: TcpListener) -> Result<(), anyhow::Error> {
    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            let service = service_fn(|req: Request<hyper::body::Incoming>| async move {
                Ok::<_, Infallible>(metrics_response(req.method(), req.uri().path()))
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!("Metrics connection error: {}", e);
            }
        });
    }
}

fn metrics_response(method: &Method, path: &str) -> Response<Full<Bytes>> {
    if method == Method::GET && path == "/metrics" {
        let mut response = Response::new(Full::new(Bytes::from(collect_metrics())));
        response.headers_mut().insert(
            hyper::header::CONTENT_TYPE,
            hyper::header::HeaderValue::from_static("text/plain; version=0.0.4"),
        );
        response
    } else {
        error_response(StatusCode::NOT_FOUND, "Not Found")
    }
}
