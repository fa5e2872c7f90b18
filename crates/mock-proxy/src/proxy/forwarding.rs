//! Reply construction for the proxy front end.

use super::headers::{
    restore_headers, MockProxyHeadersExt, VALUE_CACHE, VALUE_UPSTREAM, X_MOCK_PROXY_SOURCE,
};
use super::orchestrator::{Served, ServedFrom};
use crate::routing::MappingResolver;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use std::fmt::Write;
use tracing::warn;

/// Body sent for every internal failure; details only go to the logs.
pub const INTERNAL_ERROR_MESSAGE: &str = "An error has occurred, please review the logs.";

static TEXT_PLAIN: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");

/// Helper function to create a plain-text error response.
pub fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    text_response(status, message.to_string())
}

fn text_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, TEXT_PLAIN.clone());
    response
}

/// Rebuild the caller's reply from a recorded response.
pub fn record_response(served: &Served) -> Response<Full<Bytes>> {
    let record = &served.record;
    let mut response = Response::new(Full::new(record.body_bytes()));
    *response.status_mut() = StatusCode::from_u16(record.code).unwrap_or_else(|_| {
        warn!("Recorded status {} is not valid, replying 200", record.code);
        StatusCode::OK
    });
    *response.headers_mut() = restore_headers(&record.headers);

    let source = match served.source {
        ServedFrom::Cache => &VALUE_CACHE,
        ServedFrom::Upstream => &VALUE_UPSTREAM,
    };
    response.set_header(&X_MOCK_PROXY_SOURCE, source);
    response
}

/// Plain-text index of the configured mappings served on `GET /`.
pub fn landing_page(resolver: &MappingResolver) -> Response<Full<Bytes>> {
    let mut body = String::from("mock-proxy\n\nMappings:\n");
    for mapping in resolver.mappings() {
        let _ = writeln!(
            body,
            "  /{} -> {} (dir: {}, skipHeaders: {})",
            mapping.key,
            mapping.host,
            mapping.dir.display(),
            mapping.skip_headers
        );
    }
    text_response(StatusCode::OK, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::ResponseRecord;
    use crate::routing::Mapping;
    use http_body_util::BodyExt;
    use std::collections::BTreeMap;

    async fn body_text(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_error_response_is_plain_text() {
        let response = error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE);
        assert_eq!(response.status(), 500);
        assert_eq!(
            response.headers()[CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(body_text(response).await, INTERNAL_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_record_response_restores_status_headers_and_body() {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        headers.insert("content-length".to_string(), "1".to_string());
        let served = Served {
            record: ResponseRecord::new(201, headers, r#"{"msg":"hi"}"#),
            source: ServedFrom::Upstream,
        };

        let response = record_response(&served);
        assert_eq!(response.status(), 201);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert!(response.headers().get("content-length").is_none());
        assert_eq!(response.headers()[&X_MOCK_PROXY_SOURCE], "upstream");
        assert_eq!(body_text(response).await, r#"{"msg":"hi"}"#);
    }

    #[test]
    fn test_record_response_with_invalid_status() {
        let served = Served {
            record: ResponseRecord::new(42, BTreeMap::new(), ""),
            source: ServedFrom::Cache,
        };
        let response = record_response(&served);
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()[&X_MOCK_PROXY_SOURCE], "cache");
    }

    #[tokio::test]
    async fn test_landing_page_lists_mappings() {
        let resolver = MappingResolver::new(vec![
            Mapping::new("mocks", "http://www.example.com", "mocks"),
            Mapping::new("other", "https://api.example.org", "other").with_skip_headers(true),
        ]);
        let text = body_text(landing_page(&resolver)).await;
        assert!(text.contains("/mocks -> http://www.example.com (dir: mocks, skipHeaders: false)"));
        assert!(text.contains("/other -> https://api.example.org (dir: other, skipHeaders: true)"));
    }
}
