use serde::{Deserialize, Serialize};

use super::{unix_now, RecommendationType};

/// Per-customer personalized result list, one row per (customer, type, store).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedRecommendation {
    pub customer_id: i64,
    pub recommendation_type: RecommendationType,
    pub store_id: u32,
    pub product_ids: Vec<i64>,
    pub created_at: i64,
    pub expires_at: i64,
}

impl CachedRecommendation {
    pub fn new(
        customer_id: i64,
        recommendation_type: RecommendationType,
        store_id: u32,
        product_ids: Vec<i64>,
        ttl_secs: u64,
    ) -> Self {
        let now = unix_now();
        Self {
            customer_id,
            recommendation_type,
            store_id,
            product_ids,
            created_at: now,
            expires_at: now + ttl_secs as i64,
        }
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}
