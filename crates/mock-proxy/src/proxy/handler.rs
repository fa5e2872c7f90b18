//! Inbound request handling.
//!
//! Turns a hyper request into a [`RequestDescriptor`], hands it to the
//! orchestrator and converts the outcome into a reply. Every failure is
//! logged here and answered with an opaque plain-text body.

use super::client::{UpstreamClient, FORM_CONTENT_TYPE};
use super::forwarding::{error_response, landing_page, record_response, INTERNAL_ERROR_MESSAGE};
use super::orchestrator::ProxyOrchestrator;
use crate::error::ProxyError;
use crate::metrics;
use crate::recording::{HttpMethod, RequestDescriptor};
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::header::CONTENT_TYPE;
use hyper::{HeaderMap, Method, Request, Response};
use serde_json::Value;
use std::convert::Infallible;
use sxd_document::dom::{ChildOfElement, ChildOfRoot, Element};
use std::fmt::Display;
use tracing::{debug, error, warn};

/// Handle one inbound request.
pub async fn handle_request<C, B>(
    orchestrator: &ProxyOrchestrator<C>,
    req: Request<B>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    C: UpstreamClient,
    B: Body,
    B::Error: Display,
{
    let raw_path = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/")
        .to_string();

    debug!("Received request: {} {}", req.method(), raw_path);

    if req.method() == Method::GET && req.uri().path() == "/" {
        return Ok(landing_page(orchestrator.resolver()));
    }

    if orchestrator.resolver().resolve(&raw_path).is_none() {
        let err = ProxyError::UnmappedRequest(raw_path);
        metrics::record_request(req.method().as_str(), err.outcome());
        return Ok(failure_response(&err));
    }

    let response = match build_descriptor(req, raw_path).await {
        Ok(descriptor) => match orchestrator.handle(&descriptor).await {
            Ok(served) => record_response(&served),
            Err(e) => failure_response(&e),
        },
        Err(e) => {
            if let ProxyError::UnsupportedMethod(method) = &e {
                metrics::record_request(method, e.outcome());
            }
            failure_response(&e)
        }
    };
    Ok(response)
}

fn failure_response(err: &ProxyError) -> Response<Full<Bytes>> {
    let status = err.status();
    match err {
        ProxyError::UnmappedRequest(path) => {
            debug!("No mapping for {}", path);
            error_response(status, "Not Found")
        }
        ProxyError::UnsupportedMethod(method) => {
            warn!("Rejected unsupported method {}", method);
            error_response(status, "Method Not Allowed")
        }
        _ => {
            error!("Request failed: {}", err);
            error_response(status, INTERNAL_ERROR_MESSAGE)
        }
    }
}

async fn build_descriptor<B>(req: Request<B>, raw_path: String) -> Result<RequestDescriptor, ProxyError>
where
    B: Body,
    B::Error: Display,
{
    let method = HttpMethod::from_hyper(req.method())
        .ok_or_else(|| ProxyError::UnsupportedMethod(req.method().to_string()))?;

    let (parts, body) = req.into_parts();
    let mut descriptor = RequestDescriptor::new(method, raw_path);
    descriptor.headers = header_pairs(&parts.headers);

    if method.carries_body() {
        // An unreadable body is treated like an empty one
        let bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!("Failed to read request body: {}", e);
                Bytes::new()
            }
        };
        let content_type = parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        descriptor.body = parse_body(content_type, &bytes);
    }

    Ok(descriptor)
}

/// Inbound headers as `(name, value)` in the order hyper yields them.
pub fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

/// Form fields carried by a request body, by content type.
pub fn parse_body(content_type: &str, body: &[u8]) -> Vec<(String, String)> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    if mime == FORM_CONTENT_TYPE {
        parse_form(&String::from_utf8_lossy(body))
    } else if mime == "application/json" || mime.ends_with("+json") {
        parse_json_fields(body)
    } else if mime == "application/xml" || mime == "text/xml" || mime.ends_with("+xml") {
        parse_xml_fields(body)
    } else {
        if !body.is_empty() {
            debug!("Ignoring request body with content type '{}'", content_type);
        }
        Vec::new()
    }
}

/// `a=b&c=d` into ordered pairs, percent-decoded.
pub fn parse_form(form: &str) -> Vec<(String, String)> {
    form.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_form_component(name), decode_form_component(value))
        })
        .collect()
}

fn decode_form_component(component: &str) -> String {
    let spaced = component.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Flatten a JSON object body into form fields, keeping key order.
pub fn parse_json_fields(body: &[u8]) -> Vec<(String, String)> {
    let object = match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(object)) => object,
        Ok(_) => {
            debug!("JSON request body is not an object, ignoring it");
            return Vec::new();
        }
        Err(e) => {
            warn!("Invalid JSON request body: {}", e);
            return Vec::new();
        }
    };

    let mut fields = Vec::new();
    for (name, value) in object {
        match value {
            Value::Array(items) => {
                for item in items {
                    fields.push((name.clone(), scalar_text(&item)));
                }
            }
            other => fields.push((name, scalar_text(&other))),
        }
    }
    fields
}

/// Flatten the child elements of an XML document's root into form fields.
///
/// `<req><a>1</a><b>2</b></req>` gives `a=1&b=2`. Elements with element
/// children contribute an empty value; repeated names repeat.
pub fn parse_xml_fields(body: &[u8]) -> Vec<(String, String)> {
    let text = match std::str::from_utf8(body) {
        Ok(text) => text,
        Err(e) => {
            warn!("XML request body is not UTF-8: {}", e);
            return Vec::new();
        }
    };
    let package = match sxd_document::parser::parse(text) {
        Ok(package) => package,
        Err(e) => {
            warn!("Invalid XML request body: {:?}", e);
            return Vec::new();
        }
    };
    let document = package.as_document();

    let Some(root) = document.root().children().into_iter().find_map(|child| match child {
        ChildOfRoot::Element(element) => Some(element),
        _ => None,
    }) else {
        return Vec::new();
    };

    root.children()
        .into_iter()
        .filter_map(|child| match child {
            ChildOfElement::Element(element) => Some((
                element.name().local_part().to_string(),
                element_text(element),
            )),
            _ => None,
        })
        .collect()
}

fn element_text(element: Element<'_>) -> String {
    let children = element.children();
    if children
        .iter()
        .any(|child| matches!(child, ChildOfElement::Element(_)))
    {
        return String::new();
    }
    children
        .iter()
        .filter_map(|child| match child {
            ChildOfElement::Text(text) => Some(text.text()),
            _ => None,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}
