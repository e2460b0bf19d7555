use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::{DomainError, SalesAggregate, TrendingScore};

#[async_trait]
pub trait TrendingRepository: Send + Sync {
    /// Line items of completed orders placed at or after `since`.
    async fn aggregate_sales(
        &self,
        store_id: u32,
        since: i64,
    ) -> Result<Vec<SalesAggregate>, DomainError>;

    /// Swap the stored scores for (store, period) with `scores`.
    async fn replace_scores(
        &self,
        store_id: u32,
        period_days: u32,
        scores: &[TrendingScore],
    ) -> Result<(), DomainError>;

    async fn score_map(
        &self,
        store_id: u32,
        period_days: u32,
    ) -> Result<HashMap<i64, f64>, DomainError>;

    async fn top(
        &self,
        store_id: u32,
        period_days: u32,
        limit: usize,
    ) -> Result<Vec<TrendingScore>, DomainError>;
}
