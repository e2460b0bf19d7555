use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::application::TrendingRepository;
use crate::domain::{unix_now, DomainError, TrendingScore, TRENDING_THRESHOLD};

pub const DEFAULT_PERIOD_DAYS: u32 = 7;
pub const DEFAULT_BOOST_WEIGHT: f64 = 0.20;

/// Sales-velocity scores per product and the boost they apply to rankings.
pub struct TrendingBooster {
    repository: Arc<dyn TrendingRepository>,
    period_days: u32,
    memo: Mutex<HashMap<(u32, u32), Arc<HashMap<i64, f64>>>>,
}

impl TrendingBooster {
    pub fn new(repository: Arc<dyn TrendingRepository>) -> Self {
        Self {
            repository,
            period_days: DEFAULT_PERIOD_DAYS,
            memo: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_period(mut self, period_days: u32) -> Self {
        self.period_days = period_days.max(1);
        self
    }

    /// Recompute and persist normalized scores for the trailing window.
    pub async fn refresh(&self, store_id: u32, period_days: u32) -> Result<usize, DomainError> {
        let now = unix_now();
        let since = now - i64::from(period_days) * 86_400;
        let sales = self.repository.aggregate_sales(store_id, since).await?;

        let max_raw = sales.iter().map(|s| s.raw_score()).fold(0.0f64, f64::max);
        let scores: Vec<TrendingScore> = sales
            .iter()
            .map(|s| TrendingScore {
                product_id: s.product_id,
                store_id,
                period_days,
                order_count: s.order_count,
                qty_sold: s.qty_sold,
                sales_count: s.order_count,
                score: if max_raw > 0.0 { s.raw_score() / max_raw } else { 0.0 },
                calculated_at: now,
            })
            .collect();

        self.repository
            .replace_scores(store_id, period_days, &scores)
            .await?;
        self.memo.lock().await.clear();

        info!(
            store_id,
            period_days,
            products = scores.len(),
            "Trending scores refreshed"
        );
        Ok(scores.len())
    }

    async fn scores(&self, store_id: u32) -> Arc<HashMap<i64, f64>> {
        let key = (store_id, self.period_days);
        let mut memo = self.memo.lock().await;
        if let Some(scores) = memo.get(&key) {
            return Arc::clone(scores);
        }

        let scores = match self.repository.score_map(store_id, self.period_days).await {
            Ok(scores) => Arc::new(scores),
            Err(e) => {
                warn!("Failed to load trending scores for store {}: {}", store_id, e);
                return Arc::new(HashMap::new());
            }
        };
        memo.insert(key, Arc::clone(&scores));
        scores
    }

    pub async fn trending_score(&self, product_id: i64, store_id: u32) -> f64 {
        self.scores(store_id)
            .await
            .get(&product_id)
            .copied()
            .unwrap_or(0.0)
    }

    pub async fn is_trending(&self, product_id: i64, store_id: u32) -> bool {
        self.trending_score(product_id, store_id).await > TRENDING_THRESHOLD
    }

    pub async fn top_trending(&self, store_id: u32, limit: usize) -> Vec<TrendingScore> {
        match self.repository.top(store_id, self.period_days, limit).await {
            Ok(top) => top,
            Err(e) => {
                warn!("Failed to load top trending products: {}", e);
                Vec::new()
            }
        }
    }

    /// `boosted = original · (1 + trend · weight)`, sorted by boosted score.
    ///
    /// With a non-positive weight or no trending data the input order is kept.
    pub async fn apply_boost(
        &self,
        scores: Vec<(i64, f64)>,
        store_id: u32,
        weight: f64,
    ) -> Vec<(i64, f64)> {
        if weight <= 0.0 || scores.is_empty() {
            return scores;
        }
        let trending = self.scores(store_id).await;
        if trending.is_empty() {
            debug!("No trending data for store {}, skipping boost", store_id);
            return scores;
        }

        let mut boosted: Vec<(i64, f64)> = scores
            .into_iter()
            .map(|(id, score)| {
                let trend = trending.get(&id).copied().unwrap_or(0.0);
                (id, score * (1.0 + trend * weight))
            })
            .collect();
        boosted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        boosted
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::domain::SalesAggregate;

    #[derive(Default)]
    struct FakeTrending {
        sales: Vec<SalesAggregate>,
        stored: Mutex<Vec<TrendingScore>>,
    }

    #[async_trait]
    impl TrendingRepository for FakeTrending {
        async fn aggregate_sales(&self, _store_id: u32, _since: i64) -> Result<Vec<SalesAggregate>, DomainError> {
            Ok(self.sales.clone())
        }

        async fn replace_scores(&self, _store_id: u32, _period_days: u32, scores: &[TrendingScore]) -> Result<(), DomainError> {
            *self.stored.lock().await = scores.to_vec();
            Ok(())
        }

        async fn score_map(&self, _store_id: u32, _period_days: u32) -> Result<HashMap<i64, f64>, DomainError> {
            Ok(self.stored.lock().await.iter().map(|s| (s.product_id, s.score)).collect())
        }

        async fn top(&self, _store_id: u32, _period_days: u32, limit: usize) -> Result<Vec<TrendingScore>, DomainError> {
            let mut all = self.stored.lock().await.clone();
            all.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
            all.truncate(limit);
            Ok(all)
        }
    }

    fn booster() -> TrendingBooster {
        TrendingBooster::new(Arc::new(FakeTrending {
            sales: vec![
                SalesAggregate { product_id: 1, order_count: 4, qty_sold: 6.0 },
                SalesAggregate { product_id: 2, order_count: 1, qty_sold: 1.5 },
            ],
            ..FakeTrending::default()
        }))
    }

    #[tokio::test]
    async fn test_refresh_normalizes_by_max() {
        let booster = booster();
        assert_eq!(booster.refresh(1, 7).await.unwrap(), 2);

        assert_eq!(booster.trending_score(1, 1).await, 1.0);
        assert_eq!(booster.trending_score(2, 1).await, 0.25);
        assert!(booster.is_trending(1, 1).await);
        assert!(!booster.is_trending(2, 1).await);
        assert_eq!(booster.top_trending(1, 1).await[0].product_id, 1);
    }

    #[tokio::test]
    async fn test_boost_can_reorder() {
        let booster = booster();
        booster.refresh(1, 7).await.unwrap();

        let boosted = booster.apply_boost(vec![(3, 0.9), (1, 0.8)], 1, 0.2).await;
        assert_eq!(boosted[0].0, 1);
        assert!((boosted[0].1 - 0.96).abs() < 1e-9);
        assert_eq!(boosted[1], (3, 0.9));
    }

    #[tokio::test]
    async fn test_zero_weight_or_no_data_is_identity() {
        let booster = booster();
        let input = vec![(3, 0.9), (1, 0.8)];
        assert_eq!(booster.apply_boost(input.clone(), 1, 0.2).await, input);

        booster.refresh(1, 7).await.unwrap();
        assert_eq!(booster.apply_boost(input.clone(), 1, 0.0).await, input);
    }
}
