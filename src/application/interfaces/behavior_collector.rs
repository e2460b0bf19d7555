use async_trait::async_trait;

use crate::domain::{DomainError, ProfileType, ShopperContext};

/// Turns a shopper identity into an ordered list of signal product ids.
#[async_trait]
pub trait BehaviorCollector: Send + Sync {
    fn signal(&self) -> ProfileType;

    /// Most recent first, deduplicated, at most `limit` ids.
    async fn get_product_ids(
        &self,
        shopper: &ShopperContext,
        limit: usize,
        store_id: u32,
    ) -> Result<Vec<i64>, DomainError>;

    async fn has_data(&self, shopper: &ShopperContext, store_id: u32) -> bool {
        self.get_product_ids(shopper, 1, store_id)
            .await
            .map(|ids| !ids.is_empty())
            .unwrap_or(false)
    }
}
