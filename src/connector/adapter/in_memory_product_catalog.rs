use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::application::{ProductCatalog, ProductQuery, StoreDirectory};
use crate::domain::{DomainError, Product};

/// Catalog held in memory, keyed by (product id, store).
pub struct InMemoryProductCatalog {
    products: Arc<RwLock<BTreeMap<(i64, u32), Product>>>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self {
            products: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub async fn insert(&self, product: Product) {
        self.products
            .write()
            .await
            .insert((product.id, product.store_id), product);
    }

    pub async fn len(&self) -> usize {
        self.products.read().await.len()
    }
}

impl Default for InMemoryProductCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn get_by_id(&self, id: i64, store_id: u32) -> Result<Option<Product>, DomainError> {
        Ok(self.products.read().await.get(&(id, store_id)).cloned())
    }

    async fn query(&self, query: &ProductQuery) -> Result<Vec<Product>, DomainError> {
        let products = self.products.read().await;
        let matching = products
            .values()
            .filter(|p| p.store_id == query.store_id && query.accepts(p))
            .skip(query.offset);
        Ok(match query.limit {
            Some(limit) => matching.take(limit).cloned().collect(),
            None => matching.cloned().collect(),
        })
    }
}

#[async_trait]
impl StoreDirectory for InMemoryProductCatalog {
    async fn store_ids(&self) -> Result<Vec<u32>, DomainError> {
        let mut stores: Vec<u32> = self.products.read().await.keys().map(|(_, s)| *s).collect();
        stores.sort_unstable();
        stores.dedup();
        Ok(stores)
    }
}

/// A fixed store list from configuration.
pub struct StaticStoreDirectory {
    store_ids: Vec<u32>,
}

impl StaticStoreDirectory {
    pub fn new(store_ids: Vec<u32>) -> Self {
        Self { store_ids }
    }
}

#[async_trait]
impl StoreDirectory for StaticStoreDirectory {
    async fn store_ids(&self) -> Result<Vec<u32>, DomainError> {
        Ok(self.store_ids.clone())
    }
}
