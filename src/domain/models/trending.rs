use serde::{Deserialize, Serialize};

/// Weight of one distinct order in the raw trending score.
pub const ORDER_COUNT_WEIGHT: f64 = 1.5;

/// Score above which a product counts as trending.
pub const TRENDING_THRESHOLD: f64 = 0.3;

/// Sales aggregated for one product over a trailing window.
#[derive(Debug, Clone, PartialEq)]
pub struct SalesAggregate {
    pub product_id: i64,
    pub order_count: u64,
    pub qty_sold: f64,
}

impl SalesAggregate {
    pub fn raw_score(&self) -> f64 {
        self.order_count as f64 * ORDER_COUNT_WEIGHT + self.qty_sold
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendingScore {
    pub product_id: i64,
    pub store_id: u32,
    pub period_days: u32,
    pub order_count: u64,
    pub qty_sold: f64,
    pub sales_count: u64,
    pub score: f64,
    pub calculated_at: i64,
}
