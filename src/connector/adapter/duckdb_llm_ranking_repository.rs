use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use duckdb::{params, Connection, Row};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::LlmRankingRepository;
use crate::domain::{unix_now, DomainError, LlmRanking, RecommendationType};

const RANKING_COLUMNS: &str = "id, customer_id, product_id, recommendation_type, store_id, \
                               ranked_product_ids, metadata, model_used, estimated_cost, \
                               created_at, expires_at";

struct RankingRow {
    id: i64,
    customer_id: i64,
    product_id: i64,
    recommendation_type: String,
    store_id: u32,
    ranked_product_ids: String,
    metadata: Option<String>,
    model_used: Option<String>,
    estimated_cost: Option<f64>,
    created_at: i64,
    expires_at: Option<i64>,
}

impl RankingRow {
    fn read(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            customer_id: row.get(1)?,
            product_id: row.get(2)?,
            recommendation_type: row.get(3)?,
            store_id: row.get(4)?,
            ranked_product_ids: row.get(5)?,
            metadata: row.get(6)?,
            model_used: row.get(7)?,
            estimated_cost: row.get(8)?,
            created_at: row.get(9)?,
            expires_at: row.get(10)?,
        })
    }

    fn into_ranking(self) -> Result<LlmRanking, DomainError> {
        let metadata: Map<String, Value> = match self.metadata.as_deref() {
            Some(raw) if !raw.is_empty() => serde_json::from_str(raw)?,
            _ => Map::new(),
        };
        Ok(LlmRanking {
            id: Some(self.id),
            customer_id: self.customer_id,
            product_id: self.product_id,
            recommendation_type: RecommendationType::from_str(&self.recommendation_type)?,
            store_id: self.store_id,
            ranked_product_ids: serde_json::from_str(&self.ranked_product_ids)?,
            metadata,
            model_used: self.model_used,
            estimated_cost: self.estimated_cost,
            created_at: self.created_at,
            expires_at: self.expires_at,
        })
    }
}

/// Durable per-customer ranking records, the first lookup tier.
pub struct DuckdbLlmRankingRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DuckdbLlmRankingRepository {
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
            CREATE SEQUENCE IF NOT EXISTS llm_ranking_seq;
            CREATE TABLE IF NOT EXISTS llm_rankings (
                id BIGINT PRIMARY KEY DEFAULT nextval('llm_ranking_seq'),
                customer_id BIGINT NOT NULL,
                product_id BIGINT NOT NULL,
                recommendation_type TEXT NOT NULL,
                store_id INTEGER NOT NULL,
                ranked_product_ids TEXT NOT NULL,
                metadata TEXT,
                model_used TEXT,
                estimated_cost DOUBLE,
                created_at BIGINT NOT NULL,
                expires_at BIGINT,
                UNIQUE (customer_id, product_id, recommendation_type, store_id)
            );

            CREATE INDEX IF NOT EXISTS idx_llm_rankings_product ON llm_rankings(product_id);
            "#,
        )
        .map_err(|e| DomainError::storage(format!("Failed to initialize ranking schema: {}", e)))?;

        debug!("DuckDB llm_rankings table initialized");
        Ok(())
    }
}

#[async_trait]
impl LlmRankingRepository for DuckdbLlmRankingRepository {
    async fn save(&self, ranking: &LlmRanking) -> Result<i64, DomainError> {
        let ranked_ids = serde_json::to_string(&ranking.ranked_product_ids)?;
        let metadata = serde_json::to_string(&ranking.metadata)?;
        let conn = self.conn.lock().await;

        conn.query_row(
            r#"
            INSERT INTO llm_rankings (customer_id, product_id, recommendation_type, store_id,
                                      ranked_product_ids, metadata, model_used, estimated_cost,
                                      created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT (customer_id, product_id, recommendation_type, store_id) DO UPDATE SET
                ranked_product_ids = excluded.ranked_product_ids,
                metadata = excluded.metadata,
                model_used = excluded.model_used,
                estimated_cost = excluded.estimated_cost,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at
            RETURNING id
            "#,
            params![
                ranking.customer_id,
                ranking.product_id,
                ranking.recommendation_type.as_str(),
                ranking.store_id,
                ranked_ids,
                metadata,
                ranking.model_used,
                ranking.estimated_cost,
                ranking.created_at,
                ranking.expires_at,
            ],
            |row| row.get::<_, i64>(0),
        )
        .map_err(|e| DomainError::storage(format!("Failed to save ranking: {}", e)))
    }

    async fn get_by_id(&self, id: i64) -> Result<LlmRanking, DomainError> {
        let conn = self.conn.lock().await;
        let sql = format!("SELECT {RANKING_COLUMNS} FROM llm_rankings WHERE id = ?");
        match conn.query_row(&sql, params![id], RankingRow::read) {
            Ok(row) => row.into_ranking(),
            Err(duckdb::Error::QueryReturnedNoRows) => Err(DomainError::not_found(format!(
                "Ranking with id \"{}\" does not exist",
                id
            ))),
            Err(e) => Err(DomainError::storage(format!("Failed to load ranking: {}", e))),
        }
    }

    async fn get_by_product_and_customer(
        &self,
        product_id: i64,
        customer_id: i64,
        rec_type: RecommendationType,
        store_id: u32,
    ) -> Result<Option<LlmRanking>, DomainError> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {RANKING_COLUMNS} FROM llm_rankings \
             WHERE product_id = ? AND customer_id = ? AND recommendation_type = ? AND store_id = ? \
             AND expires_at > ? ORDER BY created_at DESC LIMIT 1"
        );
        match conn.query_row(
            &sql,
            params![product_id, customer_id, rec_type.as_str(), store_id, unix_now()],
            RankingRow::read,
        ) {
            Ok(row) => row.into_ranking().map(Some),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DomainError::storage(format!("Failed to load ranking: {}", e))),
        }
    }

    async fn delete_by_id(&self, id: i64) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM llm_rankings WHERE id = ?", params![id])
            .map_err(|e| DomainError::storage(format!("Failed to delete ranking: {}", e)))?;
        Ok(())
    }

    async fn delete_expired(&self) -> Result<usize, DomainError> {
        let conn = self.conn.lock().await;
        let removed = conn
            .execute(
                "DELETE FROM llm_rankings WHERE expires_at IS NOT NULL AND expires_at <= ?",
                params![unix_now()],
            )
            .map_err(|e| DomainError::storage(format!("Failed to delete expired rankings: {}", e)))?;
        debug!("Deleted {} expired ranking records", removed);
        Ok(removed)
    }

    async fn delete_by_customer(&self, customer_id: i64) -> Result<usize, DomainError> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM llm_rankings WHERE customer_id = ?", params![customer_id])
            .map_err(|e| DomainError::storage(format!("Failed to delete rankings: {}", e)))
    }

    async fn delete_by_product(&self, product_id: i64) -> Result<usize, DomainError> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM llm_rankings WHERE product_id = ?", params![product_id])
            .map_err(|e| DomainError::storage(format!("Failed to delete rankings: {}", e)))
    }
}
