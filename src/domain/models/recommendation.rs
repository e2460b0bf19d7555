use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Product;
use crate::domain::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationType {
    Related,
    Crosssell,
    Upsell,
    Browsing,
    Purchase,
    Wishlist,
    JustForYou,
}

impl RecommendationType {
    pub const PRODUCT_TYPES: [RecommendationType; 3] = [Self::Related, Self::Crosssell, Self::Upsell];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Related => "related",
            Self::Crosssell => "crosssell",
            Self::Upsell => "upsell",
            Self::Browsing => "browsing",
            Self::Purchase => "purchase",
            Self::Wishlist => "wishlist",
            Self::JustForYou => "just_for_you",
        }
    }

    /// Customer-level types, as opposed to product-to-product ones.
    pub fn is_personalized(&self) -> bool {
        matches!(
            self,
            Self::Browsing | Self::Purchase | Self::Wishlist | Self::JustForYou
        )
    }
}

impl fmt::Display for RecommendationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecommendationType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "related" => Ok(Self::Related),
            "crosssell" | "cross_sell" => Ok(Self::Crosssell),
            "upsell" | "up_sell" => Ok(Self::Upsell),
            "browsing" => Ok(Self::Browsing),
            "purchase" => Ok(Self::Purchase),
            "wishlist" => Ok(Self::Wishlist),
            "just_for_you" | "justforyou" => Ok(Self::JustForYou),
            other => Err(DomainError::invalid_input(format!(
                "Unknown recommendation type: {}",
                other
            ))),
        }
    }
}

/// One recommended product with its similarity evidence.
#[derive(Debug, Clone)]
pub struct RecommendationResult {
    pub product: Product,
    pub score: f32,
    pub distance: f32,
    pub recommendation_type: RecommendationType,
    pub metadata: Map<String, Value>,
}

impl RecommendationResult {
    pub fn new(
        product: Product,
        score: f32,
        distance: f32,
        recommendation_type: RecommendationType,
    ) -> Self {
        Self {
            product,
            score,
            distance,
            recommendation_type,
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn product_id(&self) -> i64 {
        self.product.id
    }

    pub fn dehydrate(&self) -> CachedResult {
        CachedResult {
            product_id: self.product.id,
            score: self.score,
            distance: self.distance,
            recommendation_type: self.recommendation_type,
            metadata: self.metadata.clone(),
        }
    }
}

impl AsRef<Product> for RecommendationResult {
    fn as_ref(&self) -> &Product {
        &self.product
    }
}

/// Serializable form of a [`RecommendationResult`] stored in the shared
/// cache; the product itself is reloaded on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResult {
    pub product_id: i64,
    pub score: f32,
    pub distance: f32,
    #[serde(rename = "type")]
    pub recommendation_type: RecommendationType,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl CachedResult {
    pub fn hydrate(self, product: Product) -> RecommendationResult {
        RecommendationResult {
            product,
            score: self.score,
            distance: self.distance,
            recommendation_type: self.recommendation_type,
            metadata: self.metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_parsing_accepts_aliases() {
        assert_eq!(
            "cross_sell".parse::<RecommendationType>().unwrap(),
            RecommendationType::Crosssell
        );
        assert_eq!(
            "just_for_you".parse::<RecommendationType>().unwrap(),
            RecommendationType::JustForYou
        );
        assert!("bogus".parse::<RecommendationType>().is_err());
    }

    #[test]
    fn test_cached_result_uses_type_key() {
        let result = RecommendationResult::new(
            Product::new(20, "SKU-20", "Chair", 10.0),
            0.9,
            0.1,
            RecommendationType::Upsell,
        )
        .with_metadata("source_product_id", 10);

        let json = serde_json::to_value(result.dehydrate()).unwrap();
        assert_eq!(json["type"], "upsell");
        assert_eq!(json["product_id"], 20);
        assert_eq!(json["metadata"]["source_product_id"], 10);
    }
}
