use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use duckdb::types::Value;
use duckdb::{params, params_from_iter, Connection, Row};
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::{ProductCatalog, ProductQuery, StoreDirectory};
use crate::domain::{DomainError, Product};

const PRODUCT_COLUMNS: &str = "id, sku, name, price, special_price, short_description, description, \
                               category_ids, category_names, attributes, store_id, enabled, visible, in_stock";

struct ProductRow {
    id: i64,
    sku: String,
    name: String,
    price: f64,
    special_price: Option<f64>,
    short_description: Option<String>,
    description: Option<String>,
    category_ids: String,
    category_names: String,
    attributes: String,
    store_id: u32,
    enabled: bool,
    visible: bool,
    in_stock: bool,
}

impl ProductRow {
    fn read(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            sku: row.get(1)?,
            name: row.get(2)?,
            price: row.get(3)?,
            special_price: row.get(4)?,
            short_description: row.get(5)?,
            description: row.get(6)?,
            category_ids: row.get(7)?,
            category_names: row.get(8)?,
            attributes: row.get(9)?,
            store_id: row.get(10)?,
            enabled: row.get(11)?,
            visible: row.get(12)?,
            in_stock: row.get(13)?,
        })
    }

    fn into_product(self) -> Result<Product, DomainError> {
        let attributes: HashMap<String, String> = serde_json::from_str(&self.attributes)?;
        Ok(Product {
            id: self.id,
            sku: self.sku,
            name: self.name,
            price: self.price,
            special_price: self.special_price,
            short_description: self.short_description,
            description: self.description,
            category_ids: serde_json::from_str(&self.category_ids)?,
            category_names: serde_json::from_str(&self.category_names)?,
            attributes,
            store_id: self.store_id,
            enabled: self.enabled,
            visible: self.visible,
            in_stock: self.in_stock,
        })
    }
}

/// Product catalog stored in DuckDB, one row per (product, store).
pub struct DuckdbProductCatalog {
    conn: Arc<Mutex<Connection>>,
}

impl DuckdbProductCatalog {
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

    /// Returns a clone of the shared connection Arc.
    /// DuckDB allows a single writer per file, so every adapter for the same
    /// database shares this connection.
    pub fn shared_connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn initialize_schema(conn: &Connection) -> Result<(), DomainError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id BIGINT NOT NULL,
                store_id INTEGER NOT NULL,
                sku TEXT NOT NULL,
                name TEXT NOT NULL,
                price DOUBLE NOT NULL,
                special_price DOUBLE,
                short_description TEXT,
                description TEXT,
                category_ids TEXT NOT NULL DEFAULT '[]',
                category_names TEXT NOT NULL DEFAULT '[]',
                attributes TEXT NOT NULL DEFAULT '{}',
                enabled BOOLEAN NOT NULL DEFAULT TRUE,
                visible BOOLEAN NOT NULL DEFAULT TRUE,
                in_stock BOOLEAN NOT NULL DEFAULT TRUE,
                PRIMARY KEY (id, store_id)
            );
            "#,
        )
        .map_err(|e| DomainError::storage(format!("Failed to initialize product schema: {}", e)))?;

        debug!("DuckDB products table initialized");
        Ok(())
    }

    pub async fn save(&self, product: &Product) -> Result<(), DomainError> {
        let category_ids = serde_json::to_string(&product.category_ids)?;
        let category_names = serde_json::to_string(&product.category_names)?;
        let attributes = serde_json::to_string(&product.attributes)?;
        let conn = self.conn.lock().await;

        conn.execute(
            r#"
            INSERT INTO products (id, store_id, sku, name, price, special_price, short_description,
                                  description, category_ids, category_names, attributes,
                                  enabled, visible, in_stock)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT (id, store_id) DO UPDATE SET
                sku = excluded.sku,
                name = excluded.name,
                price = excluded.price,
                special_price = excluded.special_price,
                short_description = excluded.short_description,
                description = excluded.description,
                category_ids = excluded.category_ids,
                category_names = excluded.category_names,
                attributes = excluded.attributes,
                enabled = excluded.enabled,
                visible = excluded.visible,
                in_stock = excluded.in_stock
            "#,
            params![
                product.id,
                product.store_id,
                product.sku,
                product.name,
                product.price,
                product.special_price,
                product.short_description,
                product.description,
                category_ids,
                category_names,
                attributes,
                product.enabled,
                product.visible,
                product.in_stock,
            ],
        )
        .map_err(|e| DomainError::storage(format!("Failed to save product: {}", e)))?;
        Ok(())
    }

    fn build_query(query: &ProductQuery) -> (String, Vec<Value>) {
        let mut sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE store_id = ?");
        let mut values = vec![Value::BigInt(query.store_id as i64)];

        if !query.ids.is_empty() {
            let placeholders = vec!["?"; query.ids.len()].join(", ");
            sql.push_str(&format!(" AND id IN ({placeholders})"));
            values.extend(query.ids.iter().map(|id| Value::BigInt(*id)));
        }
        if query.only_salable {
            sql.push_str(" AND enabled AND visible AND in_stock");
        }
        if let Some(min_price) = query.min_price {
            sql.push_str(" AND price >= ?");
            values.push(Value::Double(min_price));
        }
        sql.push_str(" ORDER BY id");
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            values.push(Value::BigInt(limit as i64));
        }
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            values.push(Value::BigInt(query.offset as i64));
        }
        (sql, values)
    }
}

#[async_trait]
impl ProductCatalog for DuckdbProductCatalog {
    async fn get_by_id(&self, id: i64, store_id: u32) -> Result<Option<Product>, DomainError> {
        let conn = self.conn.lock().await;
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ? AND store_id = ?");
        match conn.query_row(&sql, params![id, store_id], ProductRow::read) {
            Ok(row) => row.into_product().map(Some),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DomainError::storage(format!("Failed to load product: {}", e))),
        }
    }

    async fn query(&self, query: &ProductQuery) -> Result<Vec<Product>, DomainError> {
        let (sql, values) = Self::build_query(query);
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map(params_from_iter(values), ProductRow::read)
            .map_err(|e| DomainError::storage(format!("Failed to query products: {}", e)))?;

        let mut products = Vec::new();
        for row in rows {
            let row = row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?;
            products.push(row.into_product()?);
        }
        Ok(products)
    }
}

#[async_trait]
impl StoreDirectory for DuckdbProductCatalog {
    async fn store_ids(&self) -> Result<Vec<u32>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT DISTINCT store_id FROM products ORDER BY store_id")
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, u32>(0))
            .map_err(|e| DomainError::storage(format!("Failed to query stores: {}", e)))?;

        let mut stores = Vec::new();
        for row in rows {
            stores.push(row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?);
        }
        Ok(stores)
    }
}
