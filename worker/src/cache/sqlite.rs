//! SQLite implementation of the CacheStore trait
//!
//! Response bodies are deduplicated into a content-addressed blob table
//! keyed by SHA-256; entries reference their body by hash.

use crate::cache::hash::sha256;
use crate::cache::{CacheError, CacheStore, RequestKey, StoredResponse};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// SQLite-backed implementation of CacheStore
pub struct SqliteCacheStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCacheStore {
    /// Create a new SQLite cache store
    ///
    /// If the database doesn't exist, it will be created with the required schema.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, CacheError> {
        let conn = Connection::open(db_path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<(), CacheError> {
        let conn = self.conn.lock().unwrap();

        // Caches table: one row per named cache generation
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS caches (
                name TEXT PRIMARY KEY,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;

        // Entries table: request key -> response snapshot, body by hash
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS entries (
                cache_name TEXT NOT NULL,
                request_key TEXT NOT NULL,
                status INTEGER NOT NULL,
                headers TEXT NOT NULL,
                body_hash TEXT NOT NULL,
                stored_at TEXT NOT NULL,
                PRIMARY KEY (cache_name, request_key)
            )
            "#,
            [],
        )?;

        // Index for orphan pruning after a cache generation is deleted
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_entries_body_hash ON entries(body_hash)",
            [],
        )?;

        // Blobs table: content-addressed response bodies, shared across caches
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS blobs (
                sha256_hash TEXT PRIMARY KEY,
                data BLOB NOT NULL,
                size INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        info!("Offline cache database schema initialized");
        Ok(())
    }

    /// Remove blobs that no entry references any more
    fn prune_orphan_blobs(conn: &Connection) -> Result<usize, CacheError> {
        let removed = conn.execute(
            "DELETE FROM blobs WHERE sha256_hash NOT IN (SELECT body_hash FROM entries)",
            [],
        )?;
        Ok(removed)
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn open(&self, cache: &str) -> Result<(), CacheError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO caches (name) VALUES (?1)",
            params![cache],
        )?;
        Ok(())
    }

    async fn put(
        &self,
        cache: &str,
        key: &RequestKey,
        response: &StoredResponse,
    ) -> Result<(), CacheError> {
        let body_hash = sha256(&response.body);
        let headers = serde_json::to_string(&response.headers)
            .map_err(|e| CacheError::Database(e.to_string()))?;
        let stored_at = response.stored_at.to_rfc3339();

        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT OR IGNORE INTO caches (name) VALUES (?1)",
            params![cache],
        )?;

        // Identical bodies share one blob row
        conn.execute(
            "INSERT OR IGNORE INTO blobs (sha256_hash, data, size) VALUES (?1, ?2, ?3)",
            params![body_hash, response.body, response.body.len() as i64],
        )?;

        conn.execute(
            r#"
            INSERT OR REPLACE INTO entries (cache_name, request_key, status, headers, body_hash, stored_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                cache,
                key.as_str(),
                response.status as i64,
                headers,
                body_hash,
                stored_at
            ],
        )?;

        debug!(
            "Stored cache entry: cache={}, key={}, body_hash={}",
            cache,
            key,
            &body_hash[..16]
        );
        Ok(())
    }

    async fn match_entry(
        &self,
        cache: &str,
        key: &RequestKey,
    ) -> Result<Option<StoredResponse>, CacheError> {
        let conn = self.conn.lock().unwrap();

        let row = conn
            .query_row(
                r#"
                SELECT e.status, e.headers, b.data, e.stored_at
                FROM entries e
                JOIN blobs b ON e.body_hash = b.sha256_hash
                WHERE e.cache_name = ?1 AND e.request_key = ?2
                "#,
                params![cache, key.as_str()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((status, headers, body, stored_at)) = row else {
            return Ok(None);
        };

        let headers: HashMap<String, String> =
            serde_json::from_str(&headers).map_err(|e| CacheError::Database(e.to_string()))?;
        let stored_at = chrono::DateTime::parse_from_rfc3339(&stored_at)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(Some(StoredResponse {
            status: status as u16,
            headers,
            body,
            stored_at,
        }))
    }

    async fn delete_cache(&self, cache: &str) -> Result<bool, CacheError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "DELETE FROM entries WHERE cache_name = ?1",
            params![cache],
        )?;
        let existed = conn.execute("DELETE FROM caches WHERE name = ?1", params![cache])? > 0;

        match Self::prune_orphan_blobs(&conn) {
            Ok(removed) if removed > 0 => {
                debug!("Pruned {} orphaned body blobs", removed);
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to prune orphaned blobs: {}", e),
        }

        Ok(existed)
    }

    async fn cache_names(&self) -> Result<Vec<String>, CacheError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    async fn entry_keys(&self, cache: &str) -> Result<Vec<RequestKey>, CacheError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt =
            conn.prepare("SELECT request_key FROM entries WHERE cache_name = ?1 ORDER BY request_key")?;
        let keys = stmt
            .query_map(params![cache], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys.into_iter().map(RequestKey).collect())
    }
}
