//! Header names and helpers for replies built from recorded responses.

use hyper::header::{HeaderName, HeaderValue, CONTENT_LENGTH};
use hyper::{HeaderMap, Response};
use std::collections::BTreeMap;
use tracing::debug;

pub static X_MOCK_PROXY_SOURCE: HeaderName = HeaderName::from_static("x-mock-proxy-source");

pub static VALUE_CACHE: HeaderValue = HeaderValue::from_static("cache");
pub static VALUE_UPSTREAM: HeaderValue = HeaderValue::from_static("upstream");

/// Connection-scoped headers that must not be replayed verbatim.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// True for headers that are recomputed per reply instead of restored.
pub fn is_hop_by_hop(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name == CONTENT_LENGTH.as_str() || HOP_BY_HOP.contains(&name.as_str())
}

/// Turn recorded `name -> value` pairs back into a header map.
///
/// Entries that are not valid HTTP header syntax are dropped.
pub fn restore_headers(recorded: &BTreeMap<String, String>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in recorded {
        if is_hop_by_hop(name) {
            continue;
        }
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => debug!("Dropping unrestorable recorded header '{}'", name),
        }
    }
    headers
}

pub trait MockProxyHeadersExt {
    fn set_header(&mut self, name: &HeaderName, value: &HeaderValue);
}

impl<B> MockProxyHeadersExt for Response<B> {
    fn set_header(&mut self, name: &HeaderName, value: &HeaderValue) {
        self.headers_mut().insert(name.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;
    use hyper::body::Bytes;

    #[test]
    fn test_hop_by_hop_detection() {
        assert!(is_hop_by_hop("Transfer-Encoding"));
        assert!(is_hop_by_hop("connection"));
        assert!(is_hop_by_hop("content-length"));
        assert!(!is_hop_by_hop("content-type"));
        assert!(!is_hop_by_hop("set-cookie"));
    }

    #[test]
    fn test_restore_headers_skips_hop_by_hop_and_invalid() {
        let mut recorded = BTreeMap::new();
        recorded.insert("content-type".to_string(), "application/json".to_string());
        recorded.insert("transfer-encoding".to_string(), "chunked".to_string());
        recorded.insert("content-length".to_string(), "999".to_string());
        recorded.insert("bad header".to_string(), "x".to_string());
        recorded.insert("x-request-id".to_string(), "abc".to_string());

        let headers = restore_headers(&recorded);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers["content-type"], "application/json");
        assert_eq!(headers["x-request-id"], "abc");
    }

    #[test]
    fn test_set_source_header() {
        let mut response = Response::new(Full::new(Bytes::new()));
        response.set_header(&X_MOCK_PROXY_SOURCE, &VALUE_CACHE);
        assert_eq!(response.headers().get(&X_MOCK_PROXY_SOURCE).unwrap(), "cache");
    }
}
