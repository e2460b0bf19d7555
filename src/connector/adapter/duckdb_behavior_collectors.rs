use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use duckdb::{params, Connection, ToSql};
use tokio::sync::Mutex;
use tracing::debug;

use super::duckdb_commerce_store::initialize_commerce_schema;
use crate::application::BehaviorCollector;
use crate::domain::{unix_now, DomainError, ProfileType, ShopperContext};

/// A guest view of the same product within this window is not recorded again.
const GUEST_VIEW_DEDUPE_SECS: i64 = 3600;
/// Guest history older than this is pruned on write.
const GUEST_HISTORY_RETENTION_SECS: i64 = 30 * 24 * 3600;
const PURCHASED_STATES: &str = "('complete', 'processing')";

fn fetch_ids(conn: &Connection, sql: &str, args: &[&dyn ToSql]) -> Result<Vec<i64>, DomainError> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
    let rows = stmt
        .query_map(args, |row| row.get::<_, i64>(0))
        .map_err(|e| DomainError::storage(format!("Failed to query behavior data: {}", e)))?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?);
    }
    Ok(ids)
}

/// Recently viewed products. Guests are tracked by session; for a
/// logged-in shopper the same session's guest views are merged in so the
/// login transition keeps its history.
pub struct BrowsingHistoryCollector {
    conn: Arc<Mutex<Connection>>,
}

impl BrowsingHistoryCollector {
    pub async fn with_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, DomainError> {
        let conn_guard = conn.lock().await;
        initialize_commerce_schema(&conn_guard)?;
        drop(conn_guard);
        Ok(Self { conn })
    }

    /// Record a guest product view, skipping repeats within the hour and
    /// pruning history older than 30 days.
    pub async fn record_guest_view(
        &self,
        session_id: &str,
        product_id: i64,
        store_id: u32,
    ) -> Result<bool, DomainError> {
        if session_id.is_empty() {
            return Ok(false);
        }
        let now = unix_now();
        let conn = self.conn.lock().await;

        let recent: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM guest_product_views \
                 WHERE session_id = ? AND product_id = ? AND viewed_at > ?",
                params![session_id, product_id, now - GUEST_VIEW_DEDUPE_SECS],
                |row| row.get(0),
            )
            .map_err(|e| DomainError::storage(format!("Failed to check guest views: {}", e)))?;
        if recent > 0 {
            return Ok(false);
        }

        conn.execute(
            "INSERT INTO guest_product_views (session_id, product_id, store_id, viewed_at) \
             VALUES (?, ?, ?, ?)",
            params![session_id, product_id, store_id, now],
        )
        .map_err(|e| DomainError::storage(format!("Failed to record guest view: {}", e)))?;

        let pruned = conn
            .execute(
                "DELETE FROM guest_product_views WHERE viewed_at < ?",
                params![now - GUEST_HISTORY_RETENTION_SECS],
            )
            .map_err(|e| DomainError::storage(format!("Failed to prune guest views: {}", e)))?;
        if pruned > 0 {
            debug!("Pruned {} stale guest views", pruned);
        }
        Ok(true)
    }

    fn guest_history(
        conn: &Connection,
        session_id: &str,
        limit: usize,
        store_id: u32,
    ) -> Result<Vec<i64>, DomainError> {
        fetch_ids(
            conn,
            "SELECT product_id FROM guest_product_views \
             WHERE session_id = ? AND store_id = ? \
             GROUP BY product_id ORDER BY MAX(viewed_at) DESC LIMIT ?",
            &[&session_id, &store_id, &(limit as i64)],
        )
    }

    fn customer_history(
        conn: &Connection,
        customer_id: i64,
        limit: usize,
        store_id: u32,
    ) -> Result<Vec<i64>, DomainError> {
        fetch_ids(
            conn,
            "SELECT product_id FROM customer_product_views \
             WHERE customer_id = ? AND store_id = ? \
             GROUP BY product_id ORDER BY MAX(viewed_at) DESC LIMIT ?",
            &[&customer_id, &store_id, &(limit as i64)],
        )
    }
}

#[async_trait]
impl BehaviorCollector for BrowsingHistoryCollector {
    fn signal(&self) -> ProfileType {
        ProfileType::Browsing
    }

    async fn get_product_ids(
        &self,
        shopper: &ShopperContext,
        limit: usize,
        store_id: u32,
    ) -> Result<Vec<i64>, DomainError> {
        let conn = self.conn.lock().await;
        let session = shopper.session_id.as_deref().filter(|s| !s.is_empty());

        let mut ids = match shopper.customer_id {
            Some(customer_id) => Self::customer_history(&conn, customer_id, limit, store_id)?,
            None => Vec::new(),
        };
        if let Some(session_id) = session {
            ids.extend(Self::guest_history(&conn, session_id, limit, store_id)?);
        }

        let mut seen = HashSet::new();
        ids.retain(|id| seen.insert(*id));
        ids.truncate(limit);
        Ok(ids)
    }
}

/// Products from the customer's complete or processing orders, most
/// recently ordered first. Child lines of composite products are skipped.
pub struct PurchaseHistoryCollector {
    conn: Arc<Mutex<Connection>>,
}

impl PurchaseHistoryCollector {
    pub async fn with_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, DomainError> {
        let conn_guard = conn.lock().await;
        initialize_commerce_schema(&conn_guard)?;
        drop(conn_guard);
        Ok(Self { conn })
    }
}

#[async_trait]
impl BehaviorCollector for PurchaseHistoryCollector {
    fn signal(&self) -> ProfileType {
        ProfileType::Purchase
    }

    async fn get_product_ids(
        &self,
        shopper: &ShopperContext,
        limit: usize,
        store_id: u32,
    ) -> Result<Vec<i64>, DomainError> {
        let Some(customer_id) = shopper.customer_id else {
            return Ok(Vec::new());
        };
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT oi.product_id FROM sales_order_items oi \
             JOIN sales_orders o ON oi.order_id = o.order_id \
             WHERE o.customer_id = ? AND o.store_id = ? AND o.state IN {PURCHASED_STATES} \
             AND oi.parent_item_id IS NULL \
             GROUP BY oi.product_id ORDER BY MAX(o.created_at) DESC, oi.product_id LIMIT ?"
        );
        fetch_ids(&conn, &sql, &[&customer_id, &store_id, &(limit as i64)])
    }
}

/// Wishlist items, newest first. Items saved without a store count for
/// every store.
pub struct WishlistCollector {
    conn: Arc<Mutex<Connection>>,
}

impl WishlistCollector {
    pub async fn with_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, DomainError> {
        let conn_guard = conn.lock().await;
        initialize_commerce_schema(&conn_guard)?;
        drop(conn_guard);
        Ok(Self { conn })
    }
}

#[async_trait]
impl BehaviorCollector for WishlistCollector {
    fn signal(&self) -> ProfileType {
        ProfileType::Wishlist
    }

    async fn get_product_ids(
        &self,
        shopper: &ShopperContext,
        limit: usize,
        store_id: u32,
    ) -> Result<Vec<i64>, DomainError> {
        let Some(customer_id) = shopper.customer_id else {
            return Ok(Vec::new());
        };
        let conn = self.conn.lock().await;
        fetch_ids(
            &conn,
            "SELECT product_id FROM wishlist_items \
             WHERE customer_id = ? AND (store_id = ? OR store_id IS NULL) \
             GROUP BY product_id ORDER BY MAX(added_at) DESC, product_id LIMIT ?",
            &[&customer_id, &store_id, &(limit as i64)],
        )
    }
}
