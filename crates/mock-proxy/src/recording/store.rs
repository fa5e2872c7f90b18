//! File-backed response cache.
//!
//! Entries are written to a uniquely named sibling file and renamed into
//! place, so a reader sees either the previous entry or the complete new one.
//! Concurrent writers to the same key are last-writer-wins.

use super::key::derive_cache_key;
use super::types::{RequestDescriptor, ResponseRecord};
use crate::error::CacheError;
use crate::routing::ResolvedMapping;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Recorded responses stored as `.mock` files under a document root.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    doc_root: PathBuf,
}

impl ResponseCache {
    pub fn new(doc_root: impl Into<PathBuf>) -> Self {
        Self {
            doc_root: doc_root.into(),
        }
    }

    pub fn doc_root(&self) -> &Path {
        &self.doc_root
    }

    /// Absolute cache path for a resolved request.
    pub fn path_for(
        &self,
        resolved: &ResolvedMapping<'_>,
        request: &RequestDescriptor,
    ) -> Result<PathBuf, CacheError> {
        derive_cache_key(&self.doc_root, resolved, request)
    }

    /// Raw entry contents, or None on a cache miss.
    ///
    /// A missing entry and a parent that is not a directory are both misses.
    pub async fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, CacheError> {
        match fs::read(path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                debug!("Cache miss: {:?}", path);
                Ok(None)
            }
            Err(source) => Err(CacheError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Persist `record` at `path`, creating missing directories.
    pub async fn write(&self, path: &Path, record: &ResponseRecord) -> Result<(), CacheError> {
        let write_error = |source: std::io::Error| CacheError::Write {
            path: path.to_path_buf(),
            source,
        };

        let parent = path
            .parent()
            .ok_or_else(|| CacheError::NoPath(path.display().to_string()))?;
        fs::create_dir_all(parent).await.map_err(write_error)?;

        let contents = serde_json::to_vec(record)
            .map_err(|e| write_error(std::io::Error::new(ErrorKind::InvalidData, e)))?;

        let temp_path = temp_path_for(path);
        if let Err(e) = fs::write(&temp_path, &contents).await {
            discard(&temp_path).await;
            return Err(write_error(e));
        }
        if let Err(e) = fs::rename(&temp_path, path).await {
            discard(&temp_path).await;
            return Err(write_error(e));
        }

        debug!("Wrote cache entry {:?} ({} bytes)", path, contents.len());
        Ok(())
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(format!(".tmp_{}", uuid::Uuid::new_v4().simple()));
    path.with_file_name(name)
}

async fn discard(temp_path: &Path) {
    if let Err(e) = fs::remove_file(temp_path).await {
        if e.kind() != ErrorKind::NotFound {
            warn!("Failed to remove temporary cache file {:?}: {}", temp_path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::types::HttpMethod;
    use crate::routing::{Mapping, MappingResolver};
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn record(body: &str) -> ResponseRecord {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        ResponseRecord::new(200, headers, body)
    }

    #[tokio::test]
    async fn test_read_missing_entry_is_absent() {
        let dir = TempDir::new().unwrap();
        let cache = ResponseCache::new(dir.path());
        let result = cache.read(&dir.path().join("mocks/GET/nope.mock")).await;
        assert!(result.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let cache = ResponseCache::new(dir.path());
        let path = dir.path().join("mocks/GET/Authorization__12345/hello.mock");
        let written = record(r#"{"msg":"hello world"}"#);

        cache.write(&path, &written).await.unwrap();

        let raw = cache.read(&path).await.unwrap().unwrap();
        let read_back = ResponseRecord::from_slice(&raw, &path).unwrap();
        assert_eq!(read_back, written);
    }

    #[tokio::test]
    async fn test_write_overwrites_existing_entry() {
        let dir = TempDir::new().unwrap();
        let cache = ResponseCache::new(dir.path());
        let path = dir.path().join("mocks/GET/hello.mock");

        cache.write(&path, &record("first")).await.unwrap();
        cache.write(&path, &record("second")).await.unwrap();

        let raw = cache.read(&path).await.unwrap().unwrap();
        let read_back = ResponseRecord::from_slice(&raw, &path).unwrap();
        assert_eq!(read_back.body_bytes().as_ref(), b"second");
    }

    #[tokio::test]
    async fn test_write_leaves_no_temporary_files() {
        let dir = TempDir::new().unwrap();
        let cache = ResponseCache::new(dir.path());
        let path = dir.path().join("mocks/GET/hello.mock");

        cache.write(&path, &record("body")).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path().join("mocks/GET"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["hello.mock".to_string()]);
    }

    #[tokio::test]
    async fn test_degenerate_entry_coexists_with_method_directory() {
        let dir = TempDir::new().unwrap();
        let cache = ResponseCache::new(dir.path());

        cache
            .write(&dir.path().join("mocks/GET/hello.mock"), &record("nested"))
            .await
            .unwrap();
        cache
            .write(&dir.path().join("mocks/GET.mock"), &record("bare"))
            .await
            .unwrap();

        assert!(cache
            .read(&dir.path().join("mocks/GET.mock"))
            .await
            .unwrap()
            .is_some());
        assert!(dir.path().join("mocks/GET").is_dir());
    }

    #[tokio::test]
    async fn test_write_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        // A regular file where a directory is needed
        std::fs::write(dir.path().join("mocks"), b"not a directory").unwrap();
        let cache = ResponseCache::new(dir.path());

        let err = cache
            .write(&dir.path().join("mocks/GET/hello.mock"), &record("body"))
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Write { .. }));
    }

    #[tokio::test]
    async fn test_read_below_regular_file_is_a_miss() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("mocks"), b"not a directory").unwrap();
        let cache = ResponseCache::new(dir.path());

        let result = cache.read(&dir.path().join("mocks/GET/hello.mock")).await;
        assert!(result.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_writes_to_same_path_last_writer_wins() {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(ResponseCache::new(dir.path()));
        let path = dir.path().join("mocks/GET/hello.mock");

        let mut handles = Vec::new();
        for i in 0..16 {
            let cache = Arc::clone(&cache);
            let path = path.clone();
            handles.push(tokio::spawn(async move {
                cache.write(&path, &record(&format!("writer {i}"))).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let raw = cache.read(&path).await.unwrap().unwrap();
        let winner = ResponseRecord::from_slice(&raw, &path).unwrap();
        let bodies: Vec<_> = (0..16).map(|i| format!("writer {i}")).collect();
        assert!(bodies.contains(&String::from_utf8(winner.body_bytes().to_vec()).unwrap()));

        let names: Vec<_> = std::fs::read_dir(dir.path().join("mocks/GET"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["hello.mock".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_writes_to_distinct_paths() {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(ResponseCache::new(dir.path()));

        let mut handles = Vec::new();
        for i in 0..16 {
            let cache = Arc::clone(&cache);
            let path = dir.path().join(format!("mocks/GET/item__{i}.mock"));
            handles.push(tokio::spawn(async move {
                cache.write(&path, &record(&format!("item {i}"))).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        for i in 0..16 {
            let path = dir.path().join(format!("mocks/GET/item__{i}.mock"));
            let raw = cache.read(&path).await.unwrap().unwrap();
            let read_back = ResponseRecord::from_slice(&raw, &path).unwrap();
            assert_eq!(read_back.body_bytes(), format!("item {i}"));
        }
    }

    #[tokio::test]
    async fn test_path_for_joins_doc_root() {
        let dir = TempDir::new().unwrap();
        let cache = ResponseCache::new(dir.path());
        let resolver =
            MappingResolver::new(vec![Mapping::new("mocks", "http://www.example.com", "mocks")]);
        let request = RequestDescriptor::new(HttpMethod::Get, "/mocks/hello?a=b");
        let resolved = resolver.resolve(&request.raw_path).unwrap();

        let path = cache.path_for(&resolved, &request).unwrap();
        assert_eq!(path, dir.path().join("mocks/GET/hello--a=b.mock"));
    }
}
