use chrono::{Datelike, Local, NaiveDateTime, Timelike};
use serde::Serialize;
use serde_json::{json, Value};

use super::clean_text;
use crate::domain::{Product, RecommendationResult, ShopperContext};

const MAX_DESCRIPTION_CHARS: usize = 200;

/// Seasonal and shopper signals folded into the re-ranking prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingContext {
    pub season: &'static str,
    pub month: String,
    pub is_holiday_season: bool,
    pub time_of_day: &'static str,
    pub customer_segment: &'static str,
}

#[derive(Debug, Clone, Default)]
pub struct ContextBuilder;

impl ContextBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, shopper: &ShopperContext) -> RankingContext {
        self.build_at(shopper, Local::now().naive_local())
    }

    pub fn build_at(&self, shopper: &ShopperContext, now: NaiveDateTime) -> RankingContext {
        RankingContext {
            season: season(now.month()),
            month: now.format("%B").to_string(),
            is_holiday_season: is_holiday_season(now.month(), now.day()),
            time_of_day: time_of_day(now.hour()),
            customer_segment: shopper.segment(),
        }
    }

    pub fn source_product(&self, product: &Product) -> Value {
        json!({
            "name": product.name,
            "price": round2(product.final_price()),
            "category": product.primary_category_name(),
        })
    }

    pub fn candidate(&self, result: &RecommendationResult) -> Value {
        let product = &result.product;
        let description = product
            .short_description
            .as_deref()
            .or(product.description.as_deref())
            .map(truncated_description)
            .unwrap_or_default();

        json!({
            "product_id": product.id,
            "name": product.name,
            "price": round2(product.price),
            "special_price": product.special_price.map(round2),
            "has_discount": product.has_discount(),
            "discount_percentage": product.discount_percentage(),
            "category": product.primary_category_name(),
            "description": description,
            "similarity_score": round2(result.score as f64),
        })
    }
}

fn season(month: u32) -> &'static str {
    match month {
        3..=5 => "spring",
        6..=8 => "summer",
        9..=11 => "fall",
        _ => "winter",
    }
}

fn is_holiday_season(month: u32, day: u32) -> bool {
    month >= 11 || (month == 2 && day <= 14)
}

fn time_of_day(hour: u32) -> &'static str {
    match hour {
        5..=11 => "morning",
        12..=16 => "afternoon",
        17..=20 => "evening",
        _ => "night",
    }
}

fn truncated_description(raw: &str) -> String {
    let cleaned = clean_text(raw);
    if cleaned.chars().count() <= MAX_DESCRIPTION_CHARS {
        return cleaned;
    }
    let head: String = cleaned.chars().take(MAX_DESCRIPTION_CHARS - 3).collect();
    format!("{}...", head)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::domain::RecommendationType;

    fn at(month: u32, day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, month, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_seasonal_context() {
        let builder = ContextBuilder::new();
        let shopper = ShopperContext::customer(1).with_group(1);

        let ctx = builder.build_at(&shopper, at(12, 3, 9));
        assert_eq!(ctx.season, "winter");
        assert_eq!(ctx.month, "December");
        assert!(ctx.is_holiday_season);
        assert_eq!(ctx.time_of_day, "morning");
        assert_eq!(ctx.customer_segment, "regular_customer");

        let ctx = builder.build_at(&ShopperContext::default(), at(7, 20, 22));
        assert_eq!(ctx.season, "summer");
        assert!(!ctx.is_holiday_season);
        assert_eq!(ctx.time_of_day, "night");
        assert_eq!(ctx.customer_segment, "guest");
    }

    #[test]
    fn test_valentines_window_counts_as_holiday() {
        assert!(is_holiday_season(2, 14));
        assert!(!is_holiday_season(2, 15));
        assert_eq!(time_of_day(12), "afternoon");
        assert_eq!(time_of_day(17), "evening");
        assert_eq!(season(9), "fall");
    }

    #[test]
    fn test_candidate_description_is_truncated() {
        let long = "x".repeat(250);
        let product = Product::new(20, "SKU", "Chair", 100.0)
            .with_special_price(80.0)
            .with_description(long);
        let result = RecommendationResult::new(product, 0.8765, 0.14, RecommendationType::Related);

        let value = ContextBuilder::new().candidate(&result);
        let description = value["description"].as_str().unwrap();
        assert_eq!(description.chars().count(), 200);
        assert!(description.ends_with("..."));
        assert_eq!(value["similarity_score"], 0.88);
        assert_eq!(value["discount_percentage"], 20);
        assert_eq!(value["category"], "Uncategorized");
    }
}
