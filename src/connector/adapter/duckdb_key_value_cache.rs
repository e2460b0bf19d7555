use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use duckdb::{params, Connection};
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::KeyValueCache;
use crate::domain::DomainError;

/// Cache entries persisted in DuckDB so they survive restarts.
///
/// Tags are stored as `,a,b,` so a single `LIKE` finds them. Expiry is kept
/// in epoch milliseconds.
pub struct DuckdbKeyValueCache {
    conn: Arc<Mutex<Connection>>,
}

impl DuckdbKeyValueCache {
    pub fn new(db_path: &Path) -> Result<Self, DomainError> {
        let conn = Connection::open(db_path)
            .map_err(|e| DomainError::storage(format!("Failed to open DuckDB database: {}", e)))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self, DomainError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            DomainError::storage(format!("Failed to open DuckDB in-memory DB: {}", e))
        })?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create a new adapter using an existing shared connection.
    pub async fn with_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, DomainError> {
        let conn_guard = conn.lock().await;
        Self::initialize_schema(&conn_guard)?;
        drop(conn_guard);
        Ok(Self { conn })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), DomainError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                cache_key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '',
                expires_at BIGINT
            );
            "#,
        )
        .map_err(|e| DomainError::storage(format!("Failed to initialize cache schema: {}", e)))?;

        debug!("DuckDB cache_entries table initialized");
        Ok(())
    }

    fn now_millis() -> i64 {
        Utc::now().timestamp_millis()
    }

    fn expiry(ttl: Option<Duration>) -> Option<i64> {
        ttl.map(|ttl| Self::now_millis() + ttl.as_millis() as i64)
    }

    fn encode_tags(tags: &[&str]) -> String {
        if tags.is_empty() {
            String::new()
        } else {
            format!(",{},", tags.join(","))
        }
    }

    fn live_value(conn: &Connection, key: &str) -> Result<Option<String>, DomainError> {
        match conn.query_row(
            "SELECT value FROM cache_entries \
             WHERE cache_key = ? AND (expires_at IS NULL OR expires_at > ?)",
            params![key, Self::now_millis()],
            |row| row.get::<_, String>(0),
        ) {
            Ok(value) => Ok(Some(value)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DomainError::storage(format!("Failed to load cache entry: {}", e))),
        }
    }

    fn upsert(
        conn: &Connection,
        key: &str,
        value: &str,
        tags: &str,
        expires_at: Option<i64>,
    ) -> Result<(), DomainError> {
        conn.execute(
            r#"
            INSERT INTO cache_entries (cache_key, value, tags, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (cache_key) DO UPDATE SET
                value = excluded.value,
                tags = excluded.tags,
                expires_at = excluded.expires_at
            "#,
            params![key, value, tags, expires_at],
        )
        .map_err(|e| DomainError::storage(format!("Failed to save cache entry: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueCache for DuckdbKeyValueCache {
    async fn load(&self, key: &str) -> Result<Option<String>, DomainError> {
        let conn = self.conn.lock().await;
        Self::live_value(&conn, key)
    }

    async fn save(
        &self,
        key: &str,
        value: &str,
        tags: &[&str],
        ttl: Option<Duration>,
    ) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        Self::upsert(&conn, key, value, &Self::encode_tags(tags), Self::expiry(ttl))
    }

    async fn remove(&self, key: &str) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM cache_entries WHERE cache_key = ?", params![key])
            .map_err(|e| DomainError::storage(format!("Failed to remove cache entry: {}", e)))?;
        Ok(())
    }

    async fn clean_tag(&self, tag: &str) -> Result<usize, DomainError> {
        let conn = self.conn.lock().await;
        let removed = conn
            .execute(
                "DELETE FROM cache_entries WHERE tags LIKE ?",
                params![format!("%,{},%", tag)],
            )
            .map_err(|e| DomainError::storage(format!("Failed to clean cache tag: {}", e)))?;
        debug!("Removed {} cache entries tagged {}", removed, tag);
        Ok(removed)
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, DomainError> {
        let conn = self.conn.lock().await;
        let current = Self::live_value(&conn, key)?;
        let next = current.and_then(|v| v.parse::<u64>().ok()).unwrap_or(0) + 1;
        Self::upsert(&conn, key, &next.to_string(), "", Self::expiry(Some(ttl)))?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_load_remove() {
        let cache = DuckdbKeyValueCache::in_memory().unwrap();
        cache.save("k", "v1", &["t"], None).await.unwrap();
        cache.save("k", "v2", &["t"], None).await.unwrap();
        assert_eq!(cache.load("k").await.unwrap().as_deref(), Some("v2"));

        cache.remove("k").await.unwrap();
        assert!(cache.load("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_entries_are_invisible() {
        let cache = DuckdbKeyValueCache::in_memory().unwrap();
        cache
            .save("k", "v", &[], Some(Duration::from_millis(10)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.load("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clean_tag_matches_whole_tags() {
        let cache = DuckdbKeyValueCache::in_memory().unwrap();
        cache.save("a", "1", &["ai_recommendations"], None).await.unwrap();
        cache.save("b", "2", &["ai_recommendations_v2"], None).await.unwrap();

        assert_eq!(cache.clean_tag("ai_recommendations").await.unwrap(), 1);
        assert!(cache.load("b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_increment_counts_up() {
        let cache = DuckdbKeyValueCache::in_memory().unwrap();
        let ttl = Duration::from_secs(60);
        assert_eq!(cache.increment("c", ttl).await.unwrap(), 1);
        assert_eq!(cache.increment("c", ttl).await.unwrap(), 2);
        assert_eq!(cache.increment("c", ttl).await.unwrap(), 3);
    }
}
