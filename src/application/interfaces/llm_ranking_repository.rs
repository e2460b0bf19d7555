use async_trait::async_trait;

use crate::domain::{DomainError, LlmRanking, RecommendationType};

#[async_trait]
pub trait LlmRankingRepository: Send + Sync {
    /// Upsert on (customer, product, type, store); returns the row id.
    async fn save(&self, ranking: &LlmRanking) -> Result<i64, DomainError>;

    /// Fails with [`DomainError::NotFound`] for an unknown id.
    async fn get_by_id(&self, id: i64) -> Result<LlmRanking, DomainError>;

    /// Latest unexpired record, if any.
    async fn get_by_product_and_customer(
        &self,
        product_id: i64,
        customer_id: i64,
        rec_type: RecommendationType,
        store_id: u32,
    ) -> Result<Option<LlmRanking>, DomainError>;

    async fn delete_by_id(&self, id: i64) -> Result<(), DomainError>;

    async fn delete_expired(&self) -> Result<usize, DomainError>;

    async fn delete_by_customer(&self, customer_id: i64) -> Result<usize, DomainError>;

    async fn delete_by_product(&self, product_id: i64) -> Result<usize, DomainError>;
}
