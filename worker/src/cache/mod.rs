//! Versioned request/response caches
//!
//! This module provides the storage abstraction for the two named cache
//! generations (static shell, API responses): a normalized request key, a
//! stored response snapshot, and a `CacheStore` trait with in-memory and
//! SQLite-backed implementations.

pub mod hash;
pub mod memory;
pub mod sqlite;

use crate::fetch::Response;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

/// Error type for cache operations
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Storage error: {0}")]
    Storage(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cache not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for CacheError {
    fn from(e: rusqlite::Error) -> Self {
        CacheError::Database(e.to_string())
    }
}

/// Normalized cache key: method plus absolute URL, query string significant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey(String);

impl RequestKey {
    pub fn from_request(request: &crate::fetch::Request) -> Self {
        Self(format!(
            "{} {}",
            request.method.to_ascii_uppercase(),
            request.url
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored response snapshot: status, headers, body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub stored_at: DateTime<Utc>,
}

impl StoredResponse {
    /// Duplicate a live response into a snapshot. The copy shares no
    /// consumption state with the response handed back to the caller.
    pub fn from_response(response: &Response) -> Self {
        Self {
            status: response.status,
            headers: response.headers.clone(),
            body: response.body.clone(),
            stored_at: Utc::now(),
        }
    }

    pub fn into_response(self) -> Response {
        Response {
            status: self.status,
            headers: self.headers,
            body: self.body,
            from_cache: true,
        }
    }
}

/// Trait for the named, versioned cache generations
///
/// This abstraction allows for different storage backends (in-memory,
/// SQLite) while keeping the lifecycle controller and fetch strategies
/// backend-agnostic. All writes are whole-entry replacements.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Ensure a cache generation exists.
    async fn open(&self, cache: &str) -> Result<(), CacheError>;

    /// Store a snapshot under `key`, creating the cache if needed.
    ///
    /// A repeated write for the same key replaces the prior snapshot.
    async fn put(
        &self,
        cache: &str,
        key: &RequestKey,
        response: &StoredResponse,
    ) -> Result<(), CacheError>;

    /// Exact-key lookup in one cache generation.
    async fn match_entry(
        &self,
        cache: &str,
        key: &RequestKey,
    ) -> Result<Option<StoredResponse>, CacheError>;

    /// Delete a whole cache generation. Returns whether it existed.
    async fn delete_cache(&self, cache: &str) -> Result<bool, CacheError>;

    /// Names of every cache generation currently present.
    async fn cache_names(&self) -> Result<Vec<String>, CacheError>;

    /// Keys stored in one cache generation.
    async fn entry_keys(&self, cache: &str) -> Result<Vec<RequestKey>, CacheError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::Request;
    use url::Url;

    #[test]
    fn test_request_key_normalizes_method_case() {
        let url = Url::parse("https://silo.example/api/silos?unit=7").unwrap();
        let lower = RequestKey::from_request(&Request::new("get", url.clone()));
        let upper = RequestKey::from_request(&Request::new("GET", url));
        assert_eq!(lower, upper);
        assert_eq!(lower.as_str(), "GET https://silo.example/api/silos?unit=7");
    }

    #[test]
    fn test_request_key_query_is_significant() {
        let a = RequestKey::from_request(&Request::get(
            Url::parse("https://silo.example/api/alerts?page=1").unwrap(),
        ));
        let b = RequestKey::from_request(&Request::get(
            Url::parse("https://silo.example/api/alerts?page=2").unwrap(),
        ));
        assert_ne!(a, b);
    }

    #[test]
    fn test_snapshot_round_trip_marks_cache_origin() {
        let mut response = Response::new(200, b"[]".to_vec());
        response
            .headers
            .insert("content-type".to_string(), "application/json".to_string());

        let stored = StoredResponse::from_response(&response);
        let restored = stored.into_response();

        assert_eq!(restored.status, 200);
        assert_eq!(restored.body, b"[]");
        assert_eq!(
            restored.headers.get("content-type").map(String::as_str),
            Some("application/json")
        );
        assert!(restored.from_cache);
        assert!(!response.from_cache);
    }
}
