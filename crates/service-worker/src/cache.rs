use std::{collections::HashMap, fmt};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use http::{HeaderMap, Method, StatusCode};

use crate::{
    error::CacheError,
    request::{ResponseSource, WorkerRequest, WorkerResponse},
};

/// Normalized key for a cached request. Only GET requests are cached so the
/// key is always `GET <url>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    const PREFIX: &'static str = "GET ";

    pub fn for_url(url: &str) -> Self {
        CacheKey(format!("{}{url}", Self::PREFIX))
    }

    /// None for anything that isn't a GET
    pub fn for_request(request: &WorkerRequest) -> Option<Self> {
        (request.method == Method::GET).then(|| Self::for_url(&request.url()))
    }

    /// Rebuilds a key read back from persistent storage
    pub fn parse(raw: &str) -> Result<Self, CacheError> {
        if raw.starts_with(Self::PREFIX) {
            Ok(CacheKey(raw.to_string()))
        } else {
            Err(CacheError::Corrupt(format!("bad cache key: {raw}")))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn url(&self) -> &str {
        &self.0[Self::PREFIX.len()..]
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub stored_at: DateTime<Utc>,
}

impl CachedResponse {
    /// Only 2xx responses may be cached
    pub fn from_response(response: &WorkerResponse) -> Result<Self, CacheError> {
        ensure_cacheable(response.status)?;
        Ok(Self {
            status: response.status,
            headers: response.headers.clone(),
            body: response.body.clone(),
            stored_at: Utc::now(),
        })
    }

    /// Size of the stored body in bytes
    pub fn size(&self) -> u64 {
        self.body.len() as u64
    }

    pub fn into_response(self) -> WorkerResponse {
        WorkerResponse::new(self.status, self.headers, self.body).with_source(ResponseSource::Cache)
    }
}

pub fn ensure_cacheable(status: StatusCode) -> Result<(), CacheError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(CacheError::NotCacheable(status))
    }
}

/// Named, versioned response caches
///
/// Implementations must make each call atomic for the key (or namespace, for
/// `put_all` and `delete_namespace`) it touches. No other locking is done by
/// the callers
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Creates the namespace if it doesn't exist
    async fn open(&self, namespace: &str) -> Result<(), CacheError>;

    async fn match_key(
        &self,
        namespace: &str,
        key: &CacheKey,
    ) -> Result<Option<CachedResponse>, CacheError>;

    /// Stores a response, creating the namespace if needed
    async fn put(
        &self,
        namespace: &str,
        key: CacheKey,
        response: CachedResponse,
    ) -> Result<(), CacheError>;

    /// Stores every entry or none of them
    async fn put_all(
        &self,
        namespace: &str,
        entries: Vec<(CacheKey, CachedResponse)>,
    ) -> Result<(), CacheError>;

    async fn delete(&self, namespace: &str, key: &CacheKey) -> Result<bool, CacheError>;

    async fn keys(&self, namespace: &str) -> Result<Vec<CacheKey>, CacheError>;

    async fn namespaces(&self) -> Result<Vec<String>, CacheError>;

    async fn delete_namespace(&self, namespace: &str) -> Result<bool, CacheError>;

    /// Sum of the body sizes of every entry in the namespace
    async fn namespace_size(&self, namespace: &str) -> Result<u64, CacheError>;
}

#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    namespaces: DashMap<String, HashMap<CacheKey, CachedResponse>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, namespace: &str) -> Result<(), CacheError> {
        self.namespaces.entry(namespace.to_string()).or_default();
        Ok(())
    }

    async fn match_key(
        &self,
        namespace: &str,
        key: &CacheKey,
    ) -> Result<Option<CachedResponse>, CacheError> {
        Ok(self
            .namespaces
            .get(namespace)
            .and_then(|entries| entries.get(key).cloned()))
    }

    async fn put(
        &self,
        namespace: &str,
        key: CacheKey,
        response: CachedResponse,
    ) -> Result<(), CacheError> {
        ensure_cacheable(response.status)?;
        self.namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(key, response);
        Ok(())
    }

    async fn put_all(
        &self,
        namespace: &str,
        entries: Vec<(CacheKey, CachedResponse)>,
    ) -> Result<(), CacheError> {
        for (_, response) in entries.iter() {
            ensure_cacheable(response.status)?;
        }

        // The entry guard holds the shard lock so the batch lands at once
        let mut cache = self.namespaces.entry(namespace.to_string()).or_default();
        cache.extend(entries);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &CacheKey) -> Result<bool, CacheError> {
        Ok(self
            .namespaces
            .get_mut(namespace)
            .map_or(false, |mut entries| entries.remove(key).is_some()))
    }

    async fn keys(&self, namespace: &str) -> Result<Vec<CacheKey>, CacheError> {
        let mut keys: Vec<CacheKey> = self
            .namespaces
            .get(namespace)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }

    async fn namespaces(&self) -> Result<Vec<String>, CacheError> {
        let mut names: Vec<String> = self.namespaces.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<bool, CacheError> {
        Ok(self.namespaces.remove(namespace).is_some())
    }

    async fn namespace_size(&self, namespace: &str) -> Result<u64, CacheError> {
        Ok(self
            .namespaces
            .get(namespace)
            .map_or(0, |entries| entries.values().map(CachedResponse::size).sum()))
    }
}

#[cfg(test)]
mod test {
    use http::Uri;

    use super::*;

    fn cached(status: StatusCode, body: &'static [u8]) -> CachedResponse {
        CachedResponse {
            status,
            headers: HeaderMap::new(),
            body: Bytes::from_static(body),
            stored_at: Utc::now(),
        }
    }

    #[test]
    fn test_key_only_for_get() {
        let mut request = WorkerRequest::get(Uri::from_static("/favicon.ico"));
        assert_eq!(CacheKey::for_request(&request).unwrap().as_str(), "GET /favicon.ico");

        request.method = Method::POST;
        assert!(CacheKey::for_request(&request).is_none());
    }

    #[test]
    fn test_key_parse() {
        let key = CacheKey::parse("GET /api/x?y=1").unwrap();
        assert_eq!(key.url(), "/api/x?y=1");
        assert!(CacheKey::parse("POST /api/x").is_err());
    }

    #[tokio::test]
    async fn test_put_rejects_errors() {
        let storage = MemoryCacheStorage::new();
        let key = CacheKey::for_url("/api/broken");

        let r = storage
            .put("runtime-v1", key.clone(), cached(StatusCode::INTERNAL_SERVER_ERROR, b"oops"))
            .await;
        assert!(matches!(r, Err(CacheError::NotCacheable(_))));
        assert!(storage.match_key("runtime-v1", &key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_all_is_all_or_nothing() {
        let storage = MemoryCacheStorage::new();
        let entries = vec![
            (CacheKey::for_url("/a"), cached(StatusCode::OK, b"a")),
            (CacheKey::for_url("/b"), cached(StatusCode::NOT_FOUND, b"b")),
        ];

        assert!(storage.put_all("static-v1", entries).await.is_err());
        assert!(storage.keys("static-v1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_namespace_size_and_delete() {
        let storage = MemoryCacheStorage::new();
        storage.put("a", CacheKey::for_url("/1"), cached(StatusCode::OK, b"12345")).await.unwrap();
        storage.put("a", CacheKey::for_url("/2"), cached(StatusCode::OK, b"123")).await.unwrap();
        storage.open("b").await.unwrap();

        assert_eq!(storage.namespace_size("a").await.unwrap(), 8);
        assert_eq!(storage.namespaces().await.unwrap(), vec!["a", "b"]);

        assert!(storage.delete("a", &CacheKey::for_url("/1")).await.unwrap());
        assert_eq!(storage.namespace_size("a").await.unwrap(), 3);

        assert!(storage.delete_namespace("b").await.unwrap());
        assert!(!storage.delete_namespace("b").await.unwrap());
        assert_eq!(storage.namespaces().await.unwrap(), vec!["a"]);
    }
}
