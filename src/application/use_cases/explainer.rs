use serde::Serialize;

use crate::domain::{Product, ProfileType, RecommendationResult, RecommendationType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorKind {
    Semantic,
    Category,
    Brand,
    Price,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplanationFactor {
    pub kind: FactorKind,
    pub weight: f64,
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetailedExplanation {
    pub explanation: String,
    pub factors: Vec<ExplanationFactor>,
    pub score: f64,
    #[serde(rename = "type")]
    pub recommendation_type: RecommendationType,
}

/// Short, human-readable reasons for a recommendation.
#[derive(Debug, Clone, Default)]
pub struct RecommendationExplainer;

impl RecommendationExplainer {
    pub fn new() -> Self {
        Self
    }

    pub fn explain(&self, source: &Product, result: &RecommendationResult) -> String {
        let factors = self.analyze_factors(source, &result.product, result.score as f64);
        build_explanation(&factors, result.recommendation_type)
    }

    pub fn detailed(&self, source: &Product, result: &RecommendationResult) -> DetailedExplanation {
        let score = result.score as f64;
        let factors = self.analyze_factors(source, &result.product, score);
        DetailedExplanation {
            explanation: build_explanation(&factors, result.recommendation_type),
            factors,
            score: (score * 10_000.0).round() / 10_000.0,
            recommendation_type: result.recommendation_type,
        }
    }

    pub fn explain_personalized(&self, profile_type: ProfileType) -> &'static str {
        match profile_type {
            ProfileType::Browsing => "Based on your browsing history",
            ProfileType::Purchase => "Based on your past purchases",
            ProfileType::Wishlist => "Similar to items in your wishlist",
            ProfileType::JustForYou => "Recommended for you",
        }
    }

    pub fn explain_trending(&self) -> &'static str {
        "Trending now"
    }

    /// Factors ordered by descending weight.
    pub fn analyze_factors(&self, source: &Product, recommended: &Product, score: f64) -> Vec<ExplanationFactor> {
        let mut factors = Vec::new();

        if score >= 0.8 {
            factors.push(factor(FactorKind::Semantic, 0.4, "very similar features", format!("{:.2}", score)));
        } else if score >= 0.6 {
            factors.push(factor(FactorKind::Semantic, 0.3, "similar features", format!("{:.2}", score)));
        }

        let shared = recommended
            .category_ids
            .iter()
            .filter(|id| source.category_ids.contains(id))
            .count();
        if shared > 0 {
            factors.push(factor(FactorKind::Category, 0.25, "same category", shared.to_string()));
        }

        if let (Some(a), Some(b)) = (source.brand(), recommended.brand()) {
            if a == b {
                factors.push(factor(FactorKind::Brand, 0.2, "same brand", a.to_string()));
            }
        }

        if source.price > 0.0 && recommended.price > 0.0 {
            let diff = (source.price - recommended.price).abs() / source.price;
            if diff <= 0.2 {
                factors.push(factor(FactorKind::Price, 0.15, "similar price", format!("{:.1}%", diff * 100.0)));
            }
        }

        factors.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(std::cmp::Ordering::Equal));
        factors
    }
}

fn factor(kind: FactorKind, weight: f64, label: &'static str, value: String) -> ExplanationFactor {
    ExplanationFactor {
        kind,
        weight,
        label,
        value,
    }
}

fn build_explanation(factors: &[ExplanationFactor], rec_type: RecommendationType) -> String {
    match rec_type {
        RecommendationType::Upsell => return "Premium alternative".to_string(),
        RecommendationType::Crosssell => return "Complements your selection".to_string(),
        _ => {}
    }

    let top: Vec<&str> = factors.iter().take(2).map(|f| f.label).collect();
    if top.is_empty() {
        return "You might also like".to_string();
    }
    format!("Recommended because: {}", top.join(", "))
}
