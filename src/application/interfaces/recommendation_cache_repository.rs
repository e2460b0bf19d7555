use async_trait::async_trait;

use crate::domain::{CachedRecommendation, DomainError, RecommendationType};

/// Per-customer personalized result lists.
#[async_trait]
pub trait RecommendationCacheRepository: Send + Sync {
    /// Only entries that have not yet expired are returned.
    async fn find(
        &self,
        customer_id: i64,
        rec_type: RecommendationType,
        store_id: u32,
    ) -> Result<Option<CachedRecommendation>, DomainError>;

    async fn save(&self, entry: &CachedRecommendation) -> Result<(), DomainError>;

    async fn delete(
        &self,
        customer_id: i64,
        rec_type: Option<RecommendationType>,
    ) -> Result<usize, DomainError>;

    async fn delete_expired(&self) -> Result<usize, DomainError>;
}
