use std::path::Path;
use std::sync::Arc;

use duckdb::{params, Connection};
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::{unix_now, DomainError};

/// Orders, wishlists and product views: the behavior data the collectors
/// and the trending job read.
pub(crate) fn initialize_commerce_schema(conn: &Connection) -> Result<(), DomainError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS sales_orders (
            order_id BIGINT PRIMARY KEY,
            customer_id BIGINT,
            store_id INTEGER NOT NULL,
            state TEXT NOT NULL,
            created_at BIGINT NOT NULL
        );

        CREATE SEQUENCE IF NOT EXISTS sales_order_item_seq;
        CREATE TABLE IF NOT EXISTS sales_order_items (
            item_id BIGINT PRIMARY KEY DEFAULT nextval('sales_order_item_seq'),
            order_id BIGINT NOT NULL,
            product_id BIGINT NOT NULL,
            parent_item_id BIGINT,
            qty_ordered DOUBLE NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS wishlist_items (
            customer_id BIGINT NOT NULL,
            product_id BIGINT NOT NULL,
            store_id INTEGER,
            added_at BIGINT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS customer_product_views (
            customer_id BIGINT NOT NULL,
            product_id BIGINT NOT NULL,
            store_id INTEGER NOT NULL,
            viewed_at BIGINT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS guest_product_views (
            session_id TEXT NOT NULL,
            product_id BIGINT NOT NULL,
            store_id INTEGER NOT NULL,
            viewed_at BIGINT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_guest_views_session ON guest_product_views(session_id);
        "#,
    )
    .map_err(|e| DomainError::storage(format!("Failed to initialize commerce schema: {}", e)))?;

    debug!("DuckDB commerce tables initialized");
    Ok(())
}

/// One order line as recorded by the storefront.
#[derive(Debug, Clone, Copy)]
pub struct OrderLine {
    pub product_id: i64,
    pub qty: f64,
}

impl OrderLine {
    pub fn new(product_id: i64, qty: f64) -> Self {
        Self { product_id, qty }
    }
}

/// Write side of the behavior tables, used by the storefront integration
/// and by fixtures.
pub struct DuckdbCommerceStore {
    conn: Arc<Mutex<Connection>>,
}

impl DuckdbCommerceStore {
    pub fn new(db_path: &Path) -> Result<Self, DomainError> {
        let conn = Connection::open(db_path)
            .map_err(|e| DomainError::storage(format!("Failed to open DuckDB database: {}", e)))?;
        initialize_commerce_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self, DomainError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            DomainError::storage(format!("Failed to open DuckDB in-memory DB: {}", e))
        })?;
        initialize_commerce_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub async fn with_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, DomainError> {
        let conn_guard = conn.lock().await;
        initialize_commerce_schema(&conn_guard)?;
        drop(conn_guard);
        Ok(Self { conn })
    }

    pub fn shared_connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    pub async fn record_order(
        &self,
        order_id: i64,
        customer_id: Option<i64>,
        store_id: u32,
        state: &str,
        created_at: i64,
        lines: &[OrderLine],
    ) -> Result<(), DomainError> {
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        tx.execute(
            "INSERT INTO sales_orders (order_id, customer_id, store_id, state, created_at) \
             VALUES (?, ?, ?, ?, ?)",
            params![order_id, customer_id, store_id, state, created_at],
        )
        .map_err(|e| DomainError::storage(format!("Failed to save order: {}", e)))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO sales_order_items (order_id, product_id, qty_ordered) VALUES (?, ?, ?)",
                )
                .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
            for line in lines {
                stmt.execute(params![order_id, line.product_id, line.qty])
                    .map_err(|e| DomainError::storage(format!("Failed to save order line: {}", e)))?;
            }
        }

        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit: {}", e)))?;
        Ok(())
    }

    pub async fn add_to_wishlist(
        &self,
        customer_id: i64,
        product_id: i64,
        store_id: Option<u32>,
    ) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO wishlist_items (customer_id, product_id, store_id, added_at) VALUES (?, ?, ?, ?)",
            params![customer_id, product_id, store_id, unix_now()],
        )
        .map_err(|e| DomainError::storage(format!("Failed to save wishlist item: {}", e)))?;
        Ok(())
    }

    pub async fn record_customer_view(
        &self,
        customer_id: i64,
        product_id: i64,
        store_id: u32,
        viewed_at: i64,
    ) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO customer_product_views (customer_id, product_id, store_id, viewed_at) \
             VALUES (?, ?, ?, ?)",
            params![customer_id, product_id, store_id, viewed_at],
        )
        .map_err(|e| DomainError::storage(format!("Failed to save product view: {}", e)))?;
        Ok(())
    }
}
