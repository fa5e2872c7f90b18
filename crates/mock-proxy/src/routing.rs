//! Mapping resolution: which configured API a request belongs to.
//!
//! A request is routed through a mapping either by its key
//! (`/mocks/hello`) or by the mapping's upstream host written into the path
//! (`/http://www.example.com/hello`). The first mapping in key order that
//! matches wins.

use crate::config::MappingConfig;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A configured mapping, immutable for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub key: String,
    pub host: String,
    pub dir: PathBuf,
    pub skip_headers: bool,
}

impl Mapping {
    pub fn new(key: impl Into<String>, host: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            key: key.into(),
            host: host.into(),
            dir: dir.into(),
            skip_headers: false,
        }
    }

    pub fn with_skip_headers(mut self, skip_headers: bool) -> Self {
        self.skip_headers = skip_headers;
        self
    }
}

/// Which prefix selected the mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedBy {
    Key,
    Host,
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedMapping<'a> {
    pub mapping: &'a Mapping,
    pub matched_by: MatchedBy,
}

impl<'a> ResolvedMapping<'a> {
    /// Remove the matched prefix from `raw_path`, leaving the REST sub-path
    /// and query string (`/hello?a=b`, `?a=b` or empty).
    pub fn strip_prefix<'p>(&self, raw_path: &'p str) -> &'p str {
        let prefix = match self.matched_by {
            MatchedBy::Key => self.mapping.key.as_str(),
            MatchedBy::Host => self.mapping.host.as_str(),
        };
        let path = raw_path.strip_prefix('/').unwrap_or(raw_path);
        path.strip_prefix(prefix).unwrap_or(path)
    }

    /// Upstream URL for a request addressed by `raw_path`.
    ///
    /// The remainder always starts a new path segment or the query, so it can
    /// never extend the configured host name.
    pub fn upstream_url(&self, raw_path: &str) -> String {
        let remainder = self.strip_prefix(raw_path);
        let host = self.mapping.host.trim_end_matches('/');
        if remainder.is_empty() || remainder.starts_with('/') || remainder.starts_with('?') {
            format!("{host}{remainder}")
        } else {
            format!("{host}/{remainder}")
        }
    }
}

/// Resolves request paths against the mapping table.
#[derive(Debug, Clone, Default)]
pub struct MappingResolver {
    mappings: Vec<Mapping>,
}

impl MappingResolver {
    pub fn new(mappings: Vec<Mapping>) -> Self {
        Self { mappings }
    }

    pub fn from_config(mappings: &BTreeMap<String, MappingConfig>) -> Self {
        let mappings = mappings
            .iter()
            .map(|(key, config)| {
                Mapping::new(key.clone(), config.host.clone(), config.dir.clone())
                    .with_skip_headers(config.skip_headers)
            })
            .collect();
        Self::new(mappings)
    }

    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    /// Find the mapping for a request path. Returns None when unmapped.
    pub fn resolve(&self, raw_path: &str) -> Option<ResolvedMapping<'_>> {
        let path = raw_path.strip_prefix('/').unwrap_or(raw_path);

        // First-match-wins
        for mapping in &self.mappings {
            if has_prefix(path, &mapping.key) {
                return Some(ResolvedMapping {
                    mapping,
                    matched_by: MatchedBy::Key,
                });
            }
            if has_prefix(path, &mapping.host) {
                return Some(ResolvedMapping {
                    mapping,
                    matched_by: MatchedBy::Host,
                });
            }
        }
        None
    }
}

/// Plain string prefix check; an empty prefix never matches.
pub fn has_prefix(value: &str, prefix: &str) -> bool {
    !prefix.is_empty() && value.starts_with(prefix)
}
