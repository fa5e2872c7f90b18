//! Types for record/replay - inbound request descriptors and recorded responses.

use crate::error::CacheError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Methods the proxy records and replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// POST and PUT carry a form body; GET and DELETE rely on the query string.
    pub fn carries_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put)
    }

    pub fn from_hyper(method: &hyper::Method) -> Option<Self> {
        match *method {
            hyper::Method::GET => Some(HttpMethod::Get),
            hyper::Method::POST => Some(HttpMethod::Post),
            hyper::Method::PUT => Some(HttpMethod::Put),
            hyper::Method::DELETE => Some(HttpMethod::Delete),
            _ => None,
        }
    }

    pub fn to_hyper(self) -> hyper::Method {
        match self {
            HttpMethod::Get => hyper::Method::GET,
            HttpMethod::Post => hyper::Method::POST,
            HttpMethod::Put => hyper::Method::PUT,
            HttpMethod::Delete => hyper::Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One inbound call, already parsed by the HTTP front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    /// Path and query exactly as received, including the mapping segment
    pub raw_path: String,
    /// Headers in encounter order
    pub headers: Vec<(String, String)>,
    /// Form fields in encounter order (POST/PUT only)
    pub body: Vec<(String, String)>,
}

impl RequestDescriptor {
    pub fn new(method: HttpMethod, raw_path: impl Into<String>) -> Self {
        Self {
            method,
            raw_path: raw_path.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.body.push((name.into(), value.into()));
        self
    }
}

/// A recorded response as persisted in a `.mock` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    /// Hand-written mocks may leave this out
    #[serde(default = "default_code")]
    pub code: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Recorded bodies are strings; hand-written mocks may use any JSON value
    #[serde(default)]
    pub body: serde_json::Value,
}

impl ResponseRecord {
    pub fn new(code: u16, headers: BTreeMap<String, String>, body: impl Into<String>) -> Self {
        Self {
            code,
            headers,
            body: serde_json::Value::String(body.into()),
        }
    }

    /// Parse the raw contents of a cache file.
    pub fn from_slice(raw: &[u8], path: &Path) -> Result<Self, CacheError> {
        serde_json::from_slice(raw).map_err(|source| CacheError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Payload to send back to the caller.
    pub fn body_bytes(&self) -> Bytes {
        match &self.body {
            serde_json::Value::Null => Bytes::new(),
            serde_json::Value::String(text) => Bytes::from(text.clone()),
            other => Bytes::from(other.to_string()),
        }
    }
}

fn default_code() -> u16 {
    200
}

/// 2xx check applied before anything is committed to the cache.
pub fn is_success_status(status: u16) -> bool {
    (200..300).contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_serializes_with_exact_fields() {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        let record = ResponseRecord::new(200, headers, r#"{"msg":"hello world"}"#);

        let value = serde_json::to_value(&record).unwrap();
        let object = value.as_object().unwrap();
        let mut fields: Vec<_> = object.keys().cloned().collect();
        fields.sort();
        assert_eq!(fields, vec!["body", "code", "headers"]);
        assert_eq!(value["code"], 200);
        assert_eq!(value["headers"]["content-type"], "application/json");
    }

    #[test]
    fn test_structured_body_is_rendered_as_json() {
        let raw = br#"{"code":200,"headers":{},"body":{"msg":"hello world"}}"#;
        let record = ResponseRecord::from_slice(raw, Path::new("x.mock")).unwrap();
        assert_eq!(record.body, json!({"msg": "hello world"}));
        assert_eq!(record.body_bytes(), Bytes::from(r#"{"msg":"hello world"}"#));
    }

    #[test]
    fn test_missing_headers_and_body_default() {
        let record = ResponseRecord::from_slice(br#"{"code":204}"#, Path::new("x.mock")).unwrap();
        assert!(record.headers.is_empty());
        assert!(record.body_bytes().is_empty());
    }

    #[test]
    fn test_missing_code_defaults_to_ok() {
        let record = ResponseRecord::from_slice(br#"{"body":"x"}"#, Path::new("x.mock")).unwrap();
        assert_eq!(record.code, 200);
        assert_eq!(record.body_bytes(), Bytes::from("x"));
    }

    #[test]
    fn test_corrupt_entry() {
        let err = ResponseRecord::from_slice(b"not json", Path::new("x.mock")).unwrap_err();
        assert!(matches!(err, CacheError::Corrupt { .. }));
    }

    #[test]
    fn test_success_range() {
        assert!(is_success_status(200));
        assert!(is_success_status(204));
        assert!(is_success_status(299));
        assert!(!is_success_status(199));
        assert!(!is_success_status(301));
        assert!(!is_success_status(404));
        assert!(!is_success_status(500));
    }

    #[test]
    fn test_method_mapping() {
        assert_eq!(
            HttpMethod::from_hyper(&hyper::Method::DELETE),
            Some(HttpMethod::Delete)
        );
        assert_eq!(HttpMethod::from_hyper(&hyper::Method::PATCH), None);
        assert_eq!(HttpMethod::Put.to_hyper(), hyper::Method::PUT);
        assert!(HttpMethod::Post.carries_body());
        assert!(!HttpMethod::Delete.carries_body());
        assert_eq!(HttpMethod::Get.to_string(), "GET");
    }
}
