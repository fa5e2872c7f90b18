//! Cache key derivation: request shape to `.mock` file path.
//!
//! Layout under the document root:
//!
//! ```text
//! <dir>/<METHOD>/[<header>__<value>/...]/<path><query>.mock
//! ```
//!
//! `?`, `/` and `:` inside a component are rewritten to `--`, `__` and `~~`
//! so every component stays a single file name that still reads like the URL
//! it came from: `GET /mocks/hello?a=b` lands in `mocks/GET/hello--a=b.mock`.
//! A request with a query string but no sub-path uses the bare query as the
//! file name (`mocks/GET/a=b&c=d.mock`).

use super::types::RequestDescriptor;
use crate::error::CacheError;
use crate::routing::ResolvedMapping;
use std::path::{Path, PathBuf};

/// Extension of every cache entry.
pub const MOCK_SUFFIX: &str = ".mock";

/// Make one path component filesystem-safe.
pub fn escape_component(value: &str) -> String {
    value
        .replace('?', "--")
        .replace('/', "__")
        .replace(':', "~~")
}

/// URL-encode form fields as `k=v` pairs joined by `&`, in the given order.
pub fn encode_form(fields: &[(String, String)]) -> String {
    fields
        .iter()
        .map(|(key, value)| format!("{}={}", encode_form_value(key), encode_form_value(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Percent-encode one form key or value, leaving `!'()*` literal.
///
/// Keys recorded by earlier tooling kept these characters as-is, so they stay
/// unescaped for existing `.mock` trees to keep matching.
fn encode_form_value(value: &str) -> String {
    urlencoding::encode(value)
        .replace("%21", "!")
        .replace("%27", "'")
        .replace("%28", "(")
        .replace("%29", ")")
        .replace("%2A", "*")
}

/// Split a path at the first `?`. An empty query counts as no query.
pub fn split_query(path_and_query: &str) -> (&str, Option<&str>) {
    match path_and_query.split_once('?') {
        Some((path, query)) if !query.is_empty() => (path, Some(query)),
        Some((path, _)) => (path, None),
        None => (path_and_query, None),
    }
}

/// Cache key relative to the document root.
pub fn relative_cache_key(
    resolved: &ResolvedMapping<'_>,
    request: &RequestDescriptor,
) -> Result<PathBuf, CacheError> {
    let mapping = resolved.mapping;
    if mapping.dir.as_os_str().is_empty() {
        return Err(CacheError::NoPath(mapping.key.clone()));
    }

    let mut base = mapping.dir.join(request.method.as_str());

    if !mapping.skip_headers {
        for (name, value) in &request.headers {
            base.push(escape_component(&format!("{name}/{value}")));
        }
    }

    let (path, query) = split_query(resolved.strip_prefix(&request.raw_path));
    let url_path = escape_component(path.strip_prefix('/').unwrap_or(path));
    let query = query_component(request, !url_path.is_empty(), query);

    // With a sub-path the query is glued onto it; without one it is the file name.
    let leaf = format!("{url_path}{query}");
    if leaf.is_empty() {
        // Bare `/<key>`: the method directory's own file, e.g. `mocks/GET.mock`
        let mut degenerate = base.into_os_string();
        degenerate.push(MOCK_SUFFIX);
        return Ok(PathBuf::from(degenerate));
    }

    base.push(format!("{leaf}{MOCK_SUFFIX}"));
    Ok(base)
}

/// Absolute cache key under `doc_root`.
pub fn derive_cache_key(
    doc_root: &Path,
    resolved: &ResolvedMapping<'_>,
    request: &RequestDescriptor,
) -> Result<PathBuf, CacheError> {
    Ok(doc_root.join(relative_cache_key(resolved, request)?))
}

fn query_component(request: &RequestDescriptor, has_path: bool, literal: Option<&str>) -> String {
    let query = if request.method.carries_body() {
        let encoded = encode_form(&request.body);
        if has_path && !encoded.is_empty() {
            format!("?{encoded}")
        } else {
            encoded
        }
    } else {
        match literal {
            Some(query) if has_path => format!("?{query}"),
            Some(query) => query.to_string(),
            None => String::new(),
        }
    };
    escape_component(&query)
}
