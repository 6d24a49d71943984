use async_trait::async_trait;
use deadpool_sqlite::Pool;
use rusqlite::Connection;
use service_worker::{CacheError, CacheKey, CacheStorage, CachedResponse};

use super::model::{CacheEntry, CacheNamespace};

/// `CacheStorage` over the cache_namespace/cache_entry tables so caches
/// outlive the process
#[derive(Debug, Clone)]
pub struct SqliteCacheStorage {
    pool: Pool,
}

impl SqliteCacheStorage {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn interact<F, R>(&self, f: F) -> Result<R, CacheError>
    where
        F: FnOnce(&mut Connection) -> Result<R, anyhow::Error> + Send + 'static,
        R: Send + 'static,
    {
        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;

        conn.interact(f)
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?
            .map_err(|e| CacheError::Unavailable(format!("{e:#}")))
    }
}

#[async_trait]
impl CacheStorage for SqliteCacheStorage {
    async fn open(&self, namespace: &str) -> Result<(), CacheError> {
        let namespace = namespace.to_string();
        self.interact(move |conn| CacheNamespace::ensure(conn, &namespace)).await
    }

    async fn match_key(
        &self,
        namespace: &str,
        key: &CacheKey,
    ) -> Result<Option<CachedResponse>, CacheError> {
        let namespace = namespace.to_string();
        let key = key.clone();
        let entry = self
            .interact(move |conn| CacheEntry::fetch(conn, &namespace, &key))
            .await?;

        entry
            .map(|e| e.into_cached_response())
            .transpose()
            .map_err(|e| CacheError::Corrupt(e.to_string()))
    }

    async fn put(
        &self,
        namespace: &str,
        key: CacheKey,
        response: CachedResponse,
    ) -> Result<(), CacheError> {
        self.put_all(namespace, vec![(key, response)]).await
    }

    async fn put_all(
        &self,
        namespace: &str,
        entries: Vec<(CacheKey, CachedResponse)>,
    ) -> Result<(), CacheError> {
        for (_, response) in &entries {
            service_worker::cache::ensure_cacheable(response.status)?;
        }

        let namespace = namespace.to_string();
        self.interact(move |conn| {
            let rows = entries
                .into_iter()
                .map(|(key, response)| CacheEntry::new(&namespace, &key, response))
                .collect::<Result<Vec<_>, _>>()?;

            let tx = conn.transaction()?;
            CacheNamespace::ensure(&tx, &namespace)?;
            for row in &rows {
                row.upsert(&tx)?;
            }
            tx.commit()?;

            Ok(())
        })
        .await
    }

    async fn delete(&self, namespace: &str, key: &CacheKey) -> Result<bool, CacheError> {
        let namespace = namespace.to_string();
        let key = key.clone();
        self.interact(move |conn| CacheEntry::delete(conn, &namespace, &key)).await
    }

    async fn keys(&self, namespace: &str) -> Result<Vec<CacheKey>, CacheError> {
        let namespace = namespace.to_string();
        let raw = self.interact(move |conn| CacheEntry::keys(conn, &namespace)).await?;
        raw.iter().map(|k| CacheKey::parse(k)).collect()
    }

    async fn namespaces(&self) -> Result<Vec<String>, CacheError> {
        self.interact(|conn| CacheNamespace::names(conn)).await
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<bool, CacheError> {
        let namespace = namespace.to_string();
        self.interact(move |conn| CacheNamespace::delete(conn, &namespace)).await
    }

    async fn namespace_size(&self, namespace: &str) -> Result<u64, CacheError> {
        let namespace = namespace.to_string();
        self.interact(move |conn| CacheEntry::namespace_size(conn, &namespace)).await
    }
}
