use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{unix_now, RecommendationType};

/// Durable, customer-scoped record of a computed (and possibly LLM-ranked)
/// recommendation list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRanking {
    pub id: Option<i64>,
    pub customer_id: i64,
    pub product_id: i64,
    pub recommendation_type: RecommendationType,
    pub store_id: u32,
    pub ranked_product_ids: Vec<i64>,
    pub metadata: Map<String, Value>,
    pub model_used: Option<String>,
    pub estimated_cost: Option<f64>,
    pub created_at: i64,
    pub expires_at: Option<i64>,
}

impl LlmRanking {
    pub fn new(
        customer_id: i64,
        product_id: i64,
        recommendation_type: RecommendationType,
        store_id: u32,
        ranked_product_ids: Vec<i64>,
    ) -> Self {
        Self {
            id: None,
            customer_id,
            product_id,
            recommendation_type,
            store_id,
            ranked_product_ids,
            metadata: Map::new(),
            model_used: None,
            estimated_cost: None,
            created_at: unix_now(),
            expires_at: None,
        }
    }

    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.expires_at = Some(self.created_at + ttl_secs as i64);
        self
    }

    pub fn with_expires_at(mut self, expires_at: i64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_model(mut self, model: Option<String>, estimated_cost: Option<f64>) -> Self {
        self.model_used = model;
        self.estimated_cost = estimated_cost;
        self
    }

    /// A record without an expiry is treated as expired.
    pub fn is_expired_at(&self, now: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now,
            None => true,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(unix_now())
    }
}
