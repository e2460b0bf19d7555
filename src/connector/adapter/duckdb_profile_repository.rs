use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use duckdb::types::Value;
use duckdb::{params, params_from_iter, Connection, Row};
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::ProfileRepository;
use crate::domain::{CustomerProfile, DomainError, ProfileType};

const PROFILE_COLUMNS: &str = "customer_id, profile_type, embedding, source_product_ids, \
                               product_count, store_id, created_at, updated_at";

pub struct DuckdbProfileRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DuckdbProfileRepository {
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

    /// Returns a clone of the shared connection Arc.
    pub fn shared_connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn initialize_schema(conn: &Connection) -> Result<(), DomainError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS customer_profiles (
                customer_id BIGINT NOT NULL,
                profile_type TEXT NOT NULL,
                embedding TEXT NOT NULL,
                source_product_ids TEXT NOT NULL,
                product_count BIGINT NOT NULL DEFAULT 0,
                store_id INTEGER NOT NULL,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL,
                PRIMARY KEY (customer_id, profile_type, store_id)
            );

            CREATE INDEX IF NOT EXISTS idx_customer_profiles_updated
            ON customer_profiles(updated_at);
            "#,
        )
        .map_err(|e| DomainError::storage(format!("Failed to initialize profile schema: {}", e)))?;

        debug!("DuckDB customer_profiles table initialized");
        Ok(())
    }

    fn read_profile(row: &Row<'_>) -> duckdb::Result<(i64, String, String, String, i64, u32, i64, i64)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
        ))
    }

    fn into_profile(
        raw: (i64, String, String, String, i64, u32, i64, i64),
    ) -> Result<CustomerProfile, DomainError> {
        let (customer_id, profile_type, embedding, source_ids, product_count, store_id, created_at, updated_at) =
            raw;
        Ok(CustomerProfile {
            customer_id,
            profile_type: ProfileType::from_str(&profile_type)?,
            embedding: serde_json::from_str(&embedding)?,
            source_product_ids: serde_json::from_str(&source_ids)?,
            product_count: product_count.max(0) as usize,
            store_id,
            created_at,
            updated_at,
        })
    }
}

#[async_trait]
impl ProfileRepository for DuckdbProfileRepository {
    async fn save(&self, profile: &CustomerProfile) -> Result<(), DomainError> {
        let embedding = serde_json::to_string(&profile.embedding)?;
        let source_ids = serde_json::to_string(&profile.source_product_ids)?;
        let conn = self.conn.lock().await;

        conn.execute(
            r#"
            INSERT INTO customer_profiles (customer_id, profile_type, embedding, source_product_ids,
                                           product_count, store_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT (customer_id, profile_type, store_id) DO UPDATE SET
                embedding = excluded.embedding,
                source_product_ids = excluded.source_product_ids,
                product_count = excluded.product_count,
                updated_at = excluded.updated_at
            "#,
            params![
                profile.customer_id,
                profile.profile_type.as_str(),
                embedding,
                source_ids,
                profile.product_count as i64,
                profile.store_id,
                profile.created_at,
                profile.updated_at,
            ],
        )
        .map_err(|e| DomainError::storage(format!("Failed to save profile: {}", e)))?;

        debug!(
            "Saved {} profile for customer {} in store {}",
            profile.profile_type, profile.customer_id, profile.store_id
        );
        Ok(())
    }

    async fn find(
        &self,
        customer_id: i64,
        profile_type: ProfileType,
        store_id: u32,
    ) -> Result<Option<CustomerProfile>, DomainError> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {PROFILE_COLUMNS} FROM customer_profiles \
             WHERE customer_id = ? AND profile_type = ? AND store_id = ?"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;

        match stmt.query_row(
            params![customer_id, profile_type.as_str(), store_id],
            Self::read_profile,
        ) {
            Ok(raw) => Self::into_profile(raw).map(Some),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DomainError::storage(format!("Failed to load profile: {}", e))),
        }
    }

    async fn delete(
        &self,
        customer_id: i64,
        profile_type: Option<ProfileType>,
        store_id: Option<u32>,
    ) -> Result<usize, DomainError> {
        let mut sql = String::from("DELETE FROM customer_profiles WHERE customer_id = ?");
        let mut values = vec![Value::BigInt(customer_id)];
        if let Some(profile_type) = profile_type {
            sql.push_str(" AND profile_type = ?");
            values.push(Value::Text(profile_type.as_str().to_string()));
        }
        if let Some(store_id) = store_id {
            sql.push_str(" AND store_id = ?");
            values.push(Value::BigInt(store_id as i64));
        }

        let conn = self.conn.lock().await;
        let removed = conn
            .execute(&sql, params_from_iter(values))
            .map_err(|e| DomainError::storage(format!("Failed to delete profiles: {}", e)))?;
        Ok(removed)
    }

    async fn find_stale(
        &self,
        updated_before: i64,
        limit: usize,
    ) -> Result<Vec<CustomerProfile>, DomainError> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {PROFILE_COLUMNS} FROM customer_profiles \
             WHERE updated_at < ? ORDER BY updated_at ASC LIMIT ?"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map(params![updated_before, limit as i64], Self::read_profile)
            .map_err(|e| DomainError::storage(format!("Failed to query stale profiles: {}", e)))?;

        let mut profiles = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?;
            profiles.push(Self::into_profile(raw)?);
        }
        Ok(profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::unix_now;

    #[tokio::test]
    async fn test_save_is_an_upsert() {
        let repo = DuckdbProfileRepository::in_memory().unwrap();
        let first = CustomerProfile::new(5, ProfileType::Browsing, vec![0.1, 0.2], &[1, 2], 1);
        repo.save(&first).await.unwrap();

        let second = CustomerProfile::new(5, ProfileType::Browsing, vec![0.3, 0.4], &[3, 4, 5], 1);
        repo.save(&second).await.unwrap();

        let loaded = repo.find(5, ProfileType::Browsing, 1).await.unwrap().unwrap();
        assert_eq!(loaded.embedding, vec![0.3, 0.4]);
        assert_eq!(loaded.source_product_ids, vec![3, 4, 5]);
        assert_eq!(loaded.product_count, 3);
        assert!(repo.find(5, ProfileType::Purchase, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_narrowing() {
        let repo = DuckdbProfileRepository::in_memory().unwrap();
        for profile_type in [ProfileType::Browsing, ProfileType::Wishlist] {
            for store in [1, 2] {
                repo.save(&CustomerProfile::new(9, profile_type, vec![1.0], &[1], store))
                    .await
                    .unwrap();
            }
        }

        assert_eq!(repo.delete(9, Some(ProfileType::Browsing), Some(1)).await.unwrap(), 1);
        assert_eq!(repo.delete(9, Some(ProfileType::Wishlist), None).await.unwrap(), 2);
        assert_eq!(repo.delete(9, None, None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_find_stale_orders_oldest_first() {
        let repo = DuckdbProfileRepository::in_memory().unwrap();
        let now = unix_now();
        for (customer, age) in [(1, 100), (2, 10_000), (3, 50_000)] {
            let mut profile = CustomerProfile::new(customer, ProfileType::Purchase, vec![1.0], &[1], 1);
            profile.updated_at = now - age;
            repo.save(&profile).await.unwrap();
        }

        let stale = repo.find_stale(now - 3600, 10).await.unwrap();
        let ids: Vec<i64> = stale.iter().map(|p| p.customer_id).collect();
        assert_eq!(ids, vec![3, 2]);
    }
}
