use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use duckdb::types::Value;
use duckdb::{params, params_from_iter, Connection};
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::RecommendationCacheRepository;
use crate::domain::{unix_now, CachedRecommendation, DomainError, RecommendationType};

/// Personalized result lists keyed by (customer, type, store).
pub struct DuckdbRecommendationCacheRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DuckdbRecommendationCacheRepository {
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

    pub async fn with_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, DomainError> {
        let conn_guard = conn.lock().await;
        Self::initialize_schema(&conn_guard)?;
        drop(conn_guard);
        Ok(Self { conn })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), DomainError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS recommendation_cache (
                customer_id BIGINT NOT NULL,
                recommendation_type TEXT NOT NULL,
                store_id INTEGER NOT NULL,
                product_ids TEXT NOT NULL,
                created_at BIGINT NOT NULL,
                expires_at BIGINT NOT NULL,
                PRIMARY KEY (customer_id, recommendation_type, store_id)
            );
            "#,
        )
        .map_err(|e| {
            DomainError::storage(format!("Failed to initialize recommendation cache schema: {}", e))
        })?;
        Ok(())
    }
}

#[async_trait]
impl RecommendationCacheRepository for DuckdbRecommendationCacheRepository {
    async fn find(
        &self,
        customer_id: i64,
        rec_type: RecommendationType,
        store_id: u32,
    ) -> Result<Option<CachedRecommendation>, DomainError> {
        let conn = self.conn.lock().await;
        let result = conn.query_row(
            "SELECT recommendation_type, product_ids, created_at, expires_at \
             FROM recommendation_cache \
             WHERE customer_id = ? AND recommendation_type = ? AND store_id = ? AND expires_at > ?",
            params![customer_id, rec_type.as_str(), store_id, unix_now()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            },
        );

        match result {
            Ok((rec_type, product_ids, created_at, expires_at)) => Ok(Some(CachedRecommendation {
                customer_id,
                recommendation_type: RecommendationType::from_str(&rec_type)?,
                store_id,
                product_ids: serde_json::from_str(&product_ids)?,
                created_at,
                expires_at,
            })),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DomainError::storage(format!("Failed to load cached recommendations: {}", e))),
        }
    }

    async fn save(&self, entry: &CachedRecommendation) -> Result<(), DomainError> {
        let product_ids = serde_json::to_string(&entry.product_ids)?;
        let conn = self.conn.lock().await;
        conn.execute(
            r#"
            INSERT INTO recommendation_cache (customer_id, recommendation_type, store_id,
                                              product_ids, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (customer_id, recommendation_type, store_id) DO UPDATE SET
                product_ids = excluded.product_ids,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at
            "#,
            params![
                entry.customer_id,
                entry.recommendation_type.as_str(),
                entry.store_id,
                product_ids,
                entry.created_at,
                entry.expires_at,
            ],
        )
        .map_err(|e| DomainError::storage(format!("Failed to save cached recommendations: {}", e)))?;
        Ok(())
    }

    async fn delete(
        &self,
        customer_id: i64,
        rec_type: Option<RecommendationType>,
    ) -> Result<usize, DomainError> {
        let mut sql = String::from("DELETE FROM recommendation_cache WHERE customer_id = ?");
        let mut values = vec![Value::BigInt(customer_id)];
        if let Some(rec_type) = rec_type {
            sql.push_str(" AND recommendation_type = ?");
            values.push(Value::Text(rec_type.as_str().to_string()));
        }

        let conn = self.conn.lock().await;
        conn.execute(&sql, params_from_iter(values))
            .map_err(|e| DomainError::storage(format!("Failed to delete cached recommendations: {}", e)))
    }

    async fn delete_expired(&self) -> Result<usize, DomainError> {
        let conn = self.conn.lock().await;
        let removed = conn
            .execute(
                "DELETE FROM recommendation_cache WHERE expires_at <= ?",
                params![unix_now()],
            )
            .map_err(|e| DomainError::storage(format!("Failed to delete expired cache rows: {}", e)))?;
        debug!("Deleted {} expired personalized cache rows", removed);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_expired_entries_are_not_served() {
        let repo = DuckdbRecommendationCacheRepository::in_memory().unwrap();
        let mut entry = CachedRecommendation::new(1, RecommendationType::Browsing, 1, vec![3, 4], 3600);
        repo.save(&entry).await.unwrap();
        assert_eq!(
            repo.find(1, RecommendationType::Browsing, 1).await.unwrap().unwrap().product_ids,
            vec![3, 4]
        );

        entry.expires_at = unix_now() - 1;
        repo.save(&entry).await.unwrap();
        assert!(repo.find(1, RecommendationType::Browsing, 1).await.unwrap().is_none());
        assert_eq!(repo.delete_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_by_type() {
        let repo = DuckdbRecommendationCacheRepository::in_memory().unwrap();
        for rec_type in [RecommendationType::Browsing, RecommendationType::Wishlist] {
            repo.save(&CachedRecommendation::new(2, rec_type, 1, vec![1], 3600))
                .await
                .unwrap();
        }
        assert_eq!(repo.delete(2, Some(RecommendationType::Wishlist)).await.unwrap(), 1);
        assert_eq!(repo.delete(2, None).await.unwrap(), 1);
    }
}
