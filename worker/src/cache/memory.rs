//! In-memory implementation of the CacheStore trait

use crate::cache::{CacheError, CacheStore, RequestKey, StoredResponse};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// HashMap-backed `CacheStore` for tests and ephemeral hosts. Nothing
/// survives process exit.
#[derive(Default)]
pub struct MemoryCacheStore {
    caches: Mutex<HashMap<String, HashMap<RequestKey, StoredResponse>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn open(&self, cache: &str) -> Result<(), CacheError> {
        let mut caches = self.caches.lock().unwrap();
        caches.entry(cache.to_string()).or_default();
        Ok(())
    }

    async fn put(
        &self,
        cache: &str,
        key: &RequestKey,
        response: &StoredResponse,
    ) -> Result<(), CacheError> {
        let mut caches = self.caches.lock().unwrap();
        caches
            .entry(cache.to_string())
            .or_default()
            .insert(key.clone(), response.clone());
        Ok(())
    }

    async fn match_entry(
        &self,
        cache: &str,
        key: &RequestKey,
    ) -> Result<Option<StoredResponse>, CacheError> {
        let caches = self.caches.lock().unwrap();
        Ok(caches.get(cache).and_then(|entries| entries.get(key)).cloned())
    }

    async fn delete_cache(&self, cache: &str) -> Result<bool, CacheError> {
        let mut caches = self.caches.lock().unwrap();
        let existed = caches.remove(cache).is_some();
        if existed {
            debug!("Deleted cache generation {}", cache);
        }
        Ok(existed)
    }

    async fn cache_names(&self) -> Result<Vec<String>, CacheError> {
        let caches = self.caches.lock().unwrap();
        let mut names: Vec<String> = caches.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn entry_keys(&self, cache: &str) -> Result<Vec<RequestKey>, CacheError> {
        let caches = self.caches.lock().unwrap();
        Ok(caches
            .get(cache)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{Request, Response};
    use url::Url;

    fn key(url: &str) -> RequestKey {
        RequestKey::from_request(&Request::get(Url::parse(url).unwrap()))
    }

    fn snapshot(body: &[u8]) -> StoredResponse {
        StoredResponse::from_response(&Response::new(200, body.to_vec()))
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let store = MemoryCacheStore::new();
        let key = key("https://silo.example/api/silos");

        store.put("silo-api-v1", &key, &snapshot(b"[1,2]")).await.unwrap();

        let hit = store.match_entry("silo-api-v1", &key).await.unwrap().unwrap();
        assert_eq!(hit.body, b"[1,2]");

        let miss = store
            .match_entry("silo-static-v1", &key)
            .await
            .unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_prior_snapshot() {
        let store = MemoryCacheStore::new();
        let key = key("https://silo.example/api/alerts");

        store.put("silo-api-v1", &key, &snapshot(b"old")).await.unwrap();
        store.put("silo-api-v1", &key, &snapshot(b"new")).await.unwrap();

        let hit = store.match_entry("silo-api-v1", &key).await.unwrap().unwrap();
        assert_eq!(hit.body, b"new");
        assert_eq!(store.entry_keys("silo-api-v1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_open_and_delete() {
        let store = MemoryCacheStore::new();

        store.open("silo-static-v1").await.unwrap();
        store.open("silo-static-v0").await.unwrap();
        assert_eq!(
            store.cache_names().await.unwrap(),
            vec!["silo-static-v0".to_string(), "silo-static-v1".to_string()]
        );

        assert!(store.delete_cache("silo-static-v0").await.unwrap());
        assert!(!store.delete_cache("silo-static-v0").await.unwrap());
        assert_eq!(
            store.cache_names().await.unwrap(),
            vec!["silo-static-v1".to_string()]
        );
    }
}
