use super::RecommendationType;

/// Tag carried by every shared-cache entry holding recommendation results.
pub const RECOMMENDATION_CACHE_TAG: &str = "ai_recommendations";

/// Central construction of shared-cache keys; reads and writes both go
/// through here.
pub struct CacheKey;

impl CacheKey {
    pub fn recommendation(product_id: i64, rec_type: RecommendationType, store_id: u32) -> String {
        format!("ai_rec_{}_{}_{}", product_id, rec_type.as_str(), store_id)
    }

    pub fn circuit_breaker(service: &str) -> String {
        format!("circuit_breaker_{}_failures", service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_formats() {
        assert_eq!(
            CacheKey::recommendation(10, RecommendationType::Crosssell, 2),
            "ai_rec_10_crosssell_2"
        );
        assert_eq!(CacheKey::circuit_breaker("llm"), "circuit_breaker_llm_failures");
    }
}
