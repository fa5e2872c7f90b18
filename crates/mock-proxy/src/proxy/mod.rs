//! Proxy server module.
//!
//! # Module Structure
//!
//! - `server` - ProxyServer struct and main run loop
//! - `handler` - Inbound request parsing and reply selection
//! - `orchestrator` - Record/replay decision for one request
//! - `forwarding` - Reply construction from recorded responses
//! - `client` - Upstream HTTP client and its trait seam
//! - `headers` - Header names and restoration helpers

mod client;
mod forwarding;
mod handler;
mod headers;
mod orchestrator;
mod server;

pub use client::{
    flatten_headers, HyperUpstreamClient, UpstreamClient, UpstreamRequest, UpstreamResponse,
};
pub use forwarding::{error_response, INTERNAL_ERROR_MESSAGE};
pub use handler::{handle_request, parse_body};
pub use headers::X_MOCK_PROXY_SOURCE;
pub use orchestrator::{ProxyOrchestrator, Served, ServedFrom};
pub use server::ProxyServer;
