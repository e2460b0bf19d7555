use async_trait::async_trait;

use crate::domain::{DomainError, Product};

/// Filters for loading products from the catalog.
#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
    pub ids: Vec<i64>,
    pub store_id: u32,
    pub only_salable: bool,
    pub min_price: Option<f64>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl ProductQuery {
    pub fn by_ids(ids: Vec<i64>, store_id: u32) -> Self {
        Self {
            ids,
            store_id,
            ..Self::default()
        }
    }

    /// Enabled, visible and in stock.
    pub fn salable(mut self) -> Self {
        self.only_salable = true;
        self
    }

    pub fn with_min_price(mut self, min_price: f64) -> Self {
        self.min_price = Some(min_price);
        self
    }

    pub fn with_page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }

    pub fn accepts(&self, product: &Product) -> bool {
        if !self.ids.is_empty() && !self.ids.contains(&product.id) {
            return false;
        }
        if self.only_salable && !product.is_salable() {
            return false;
        }
        if let Some(min_price) = self.min_price {
            if product.price < min_price {
                return false;
            }
        }
        true
    }
}

/// Read-only product data source.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn get_by_id(&self, id: i64, store_id: u32) -> Result<Option<Product>, DomainError>;

    /// Result order is unspecified; callers reorder as needed.
    async fn query(&self, query: &ProductQuery) -> Result<Vec<Product>, DomainError>;
}

/// Enumerates the stores the catalog is served in.
#[async_trait]
pub trait StoreDirectory: Send + Sync {
    async fn store_ids(&self) -> Result<Vec<u32>, DomainError>;
}
