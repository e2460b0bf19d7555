use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use duckdb::{params, Connection, Row};
use tokio::sync::Mutex;
use tracing::debug;

use super::duckdb_commerce_store::initialize_commerce_schema;
use crate::application::TrendingRepository;
use crate::domain::{DomainError, SalesAggregate, TrendingScore};

/// Sales aggregation over the commerce tables plus the persisted
/// `trending_scores` table.
pub struct DuckdbTrendingRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DuckdbTrendingRepository {
    pub async fn with_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, DomainError> {
        let conn_guard = conn.lock().await;
        initialize_commerce_schema(&conn_guard)?;
        Self::initialize_schema(&conn_guard)?;
        drop(conn_guard);
        Ok(Self { conn })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), DomainError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS trending_scores (
                product_id BIGINT NOT NULL,
                store_id INTEGER NOT NULL,
                period_days INTEGER NOT NULL,
                order_count BIGINT NOT NULL,
                qty_sold DOUBLE NOT NULL,
                sales_count BIGINT NOT NULL,
                score DOUBLE NOT NULL,
                calculated_at BIGINT NOT NULL,
                PRIMARY KEY (product_id, store_id, period_days)
            );
            "#,
        )
        .map_err(|e| DomainError::storage(format!("Failed to initialize trending schema: {}", e)))?;
        Ok(())
    }

    fn read_score(row: &Row<'_>) -> duckdb::Result<TrendingScore> {
        Ok(TrendingScore {
            product_id: row.get(0)?,
            store_id: row.get(1)?,
            period_days: row.get(2)?,
            order_count: row.get::<_, i64>(3)?.max(0) as u64,
            qty_sold: row.get(4)?,
            sales_count: row.get::<_, i64>(5)?.max(0) as u64,
            score: row.get(6)?,
            calculated_at: row.get(7)?,
        })
    }
}

#[async_trait]
impl TrendingRepository for DuckdbTrendingRepository {
    async fn aggregate_sales(
        &self,
        store_id: u32,
        since: i64,
    ) -> Result<Vec<SalesAggregate>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT oi.product_id, COUNT(DISTINCT oi.order_id), SUM(oi.qty_ordered) \
                 FROM sales_order_items oi JOIN sales_orders o ON oi.order_id = o.order_id \
                 WHERE o.store_id = ? AND o.created_at >= ? AND o.state = 'complete' \
                 AND oi.parent_item_id IS NULL \
                 GROUP BY oi.product_id",
            )
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;

        let rows = stmt
            .query_map(params![store_id, since], |row| {
                Ok(SalesAggregate {
                    product_id: row.get(0)?,
                    order_count: row.get::<_, i64>(1)?.max(0) as u64,
                    qty_sold: row.get(2)?,
                })
            })
            .map_err(|e| DomainError::storage(format!("Failed to aggregate sales: {}", e)))?;

        let mut aggregates = Vec::new();
        for row in rows {
            aggregates.push(row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?);
        }
        Ok(aggregates)
    }

    async fn replace_scores(
        &self,
        store_id: u32,
        period_days: u32,
        scores: &[TrendingScore],
    ) -> Result<(), DomainError> {
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        tx.execute(
            "DELETE FROM trending_scores WHERE store_id = ? AND period_days = ?",
            params![store_id, period_days],
        )
        .map_err(|e| DomainError::storage(format!("Failed to clear trending scores: {}", e)))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO trending_scores (product_id, store_id, period_days, order_count, \
                     qty_sold, sales_count, score, calculated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
            for score in scores {
                stmt.execute(params![
                    score.product_id,
                    store_id,
                    period_days,
                    score.order_count as i64,
                    score.qty_sold,
                    score.sales_count as i64,
                    score.score,
                    score.calculated_at,
                ])
                .map_err(|e| DomainError::storage(format!("Failed to save trending score: {}", e)))?;
            }
        }

        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit: {}", e)))?;

        debug!("Stored {} trending scores for store {}", scores.len(), store_id);
        Ok(())
    }

    async fn score_map(
        &self,
        store_id: u32,
        period_days: u32,
    ) -> Result<HashMap<i64, f64>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT product_id, score FROM trending_scores WHERE store_id = ? AND period_days = ?")
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map(params![store_id, period_days], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?))
            })
            .map_err(|e| DomainError::storage(format!("Failed to query trending scores: {}", e)))?;

        let mut scores = HashMap::new();
        for row in rows {
            let (product_id, score) =
                row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?;
            scores.insert(product_id, score);
        }
        Ok(scores)
    }

    async fn top(
        &self,
        store_id: u32,
        period_days: u32,
        limit: usize,
    ) -> Result<Vec<TrendingScore>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT product_id, store_id, period_days, order_count, qty_sold, sales_count, \
                 score, calculated_at FROM trending_scores \
                 WHERE store_id = ? AND period_days = ? \
                 ORDER BY score DESC, product_id LIMIT ?",
            )
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map(params![store_id, period_days, limit as i64], Self::read_score)
            .map_err(|e| DomainError::storage(format!("Failed to query trending scores: {}", e)))?;

        let mut scores = Vec::new();
        for row in rows {
            scores.push(row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?);
        }
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::adapter::{DuckdbCommerceStore, OrderLine};
    use crate::domain::unix_now;

    #[tokio::test]
    async fn test_aggregates_only_recent_complete_orders() {
        let store = DuckdbCommerceStore::in_memory().unwrap();
        let repo = DuckdbTrendingRepository::with_connection(store.shared_connection())
            .await
            .unwrap();
        let now = unix_now();

        store
            .record_order(1, None, 1, "complete", now, &[OrderLine::new(5, 2.0), OrderLine::new(6, 1.0)])
            .await
            .unwrap();
        store
            .record_order(2, Some(1), 1, "complete", now, &[OrderLine::new(5, 3.0)])
            .await
            .unwrap();
        store
            .record_order(3, None, 1, "complete", now - 30 * 86_400, &[OrderLine::new(6, 9.0)])
            .await
            .unwrap();
        store
            .record_order(4, None, 1, "pending", now, &[OrderLine::new(6, 9.0)])
            .await
            .unwrap();

        let mut sales = repo.aggregate_sales(1, now - 7 * 86_400).await.unwrap();
        sales.sort_by_key(|s| s.product_id);
        assert_eq!(sales.len(), 2);
        assert_eq!(sales[0].order_count, 2);
        assert_eq!(sales[0].qty_sold, 5.0);
        assert_eq!(sales[1].order_count, 1);
        assert_eq!(sales[1].qty_sold, 1.0);
    }

    #[tokio::test]
    async fn test_replace_scores_swaps_the_period() {
        let store = DuckdbCommerceStore::in_memory().unwrap();
        let repo = DuckdbTrendingRepository::with_connection(store.shared_connection())
            .await
            .unwrap();
        let score = |product_id, score| TrendingScore {
            product_id,
            store_id: 1,
            period_days: 7,
            order_count: 1,
            qty_sold: 1.0,
            sales_count: 1,
            score,
            calculated_at: 0,
        };

        repo.replace_scores(1, 7, &[score(1, 1.0), score(2, 0.5)]).await.unwrap();
        repo.replace_scores(1, 7, &[score(3, 1.0)]).await.unwrap();

        let map = repo.score_map(1, 7).await.unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&3), Some(&1.0));
        assert_eq!(repo.top(1, 7, 5).await.unwrap()[0].product_id, 3);
        assert!(repo.score_map(1, 30).await.unwrap().is_empty());
    }
}
