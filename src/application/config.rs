use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, ProfileType, RecommendationType};

/// Runtime settings for every recommendation use case.
///
/// Every field has a default, so a partial JSON file is enough:
///
/// ```json
/// { "llm": { "enabled": true, "provider": "claude" }, "cache": { "lifetime_secs": 600 } }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    pub general: GeneralConfig,
    pub similarity: SimilarityConfig,
    pub text: TextConfig,
    pub cache: CacheConfig,
    pub personalization: PersonalizationConfig,
    pub llm: LlmConfig,
    pub ranking: RankingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub enabled: bool,
    pub collection_name: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            collection_name: "products".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    pub related_enabled: bool,
    pub related_count: usize,
    pub crosssell_enabled: bool,
    pub crosssell_count: usize,
    pub upsell_enabled: bool,
    pub upsell_count: usize,
    pub threshold: f32,
    pub upsell_price_threshold_percent: f64,
    pub exclude_same_category_for_crosssell: bool,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            related_enabled: true,
            related_count: 8,
            crosssell_enabled: true,
            crosssell_count: 4,
            upsell_enabled: true,
            upsell_count: 4,
            threshold: 0.5,
            upsell_price_threshold_percent: 10.0,
            exclude_same_category_for_crosssell: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    pub product_attributes: Vec<String>,
    pub include_categories: bool,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            product_attributes: ["name", "short_description", "description", "meta_keywords"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            include_categories: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub lifetime_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lifetime_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalizationConfig {
    pub browsing_enabled: bool,
    pub browsing_limit: usize,
    pub purchase_enabled: bool,
    pub purchase_limit: usize,
    pub wishlist_enabled: bool,
    pub wishlist_limit: usize,
    pub just_for_you_enabled: bool,
    pub just_for_you_limit: usize,
    /// Blend weights as percentages; normalized by 100 when used.
    pub wishlist_weight_percent: f32,
    pub purchase_weight_percent: f32,
    pub browsing_weight_percent: f32,
    pub browsing_history_window: usize,
    pub purchase_history_window: usize,
    pub wishlist_history_window: usize,
    pub combined_history_window: usize,
}

impl Default for PersonalizationConfig {
    fn default() -> Self {
        Self {
            browsing_enabled: true,
            browsing_limit: 8,
            purchase_enabled: true,
            purchase_limit: 8,
            wishlist_enabled: true,
            wishlist_limit: 8,
            just_for_you_enabled: true,
            just_for_you_limit: 12,
            wishlist_weight_percent: 40.0,
            purchase_weight_percent: 35.0,
            browsing_weight_percent: 25.0,
            browsing_history_window: 15,
            purchase_history_window: 20,
            wishlist_history_window: 20,
            combined_history_window: 20,
        }
    }
}

impl PersonalizationConfig {
    pub fn is_enabled(&self, profile_type: ProfileType) -> bool {
        match profile_type {
            ProfileType::Browsing => self.browsing_enabled,
            ProfileType::Purchase => self.purchase_enabled,
            ProfileType::Wishlist => self.wishlist_enabled,
            ProfileType::JustForYou => self.just_for_you_enabled,
        }
    }

    pub fn default_limit(&self, profile_type: ProfileType) -> usize {
        match profile_type {
            ProfileType::Browsing => self.browsing_limit,
            ProfileType::Purchase => self.purchase_limit,
            ProfileType::Wishlist => self.wishlist_limit,
            ProfileType::JustForYou => self.just_for_you_limit,
        }
    }

    pub fn history_window(&self, profile_type: ProfileType) -> usize {
        match profile_type {
            ProfileType::Browsing => self.browsing_history_window,
            ProfileType::Purchase => self.purchase_history_window,
            ProfileType::Wishlist => self.wishlist_history_window,
            ProfileType::JustForYou => self.combined_history_window,
        }
    }

    pub fn weights(&self) -> ProfileWeights {
        ProfileWeights {
            wishlist: self.wishlist_weight_percent / 100.0,
            purchase: self.purchase_weight_percent / 100.0,
            browsing: self.browsing_weight_percent / 100.0,
        }
    }
}

/// Blend weights for the combined profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileWeights {
    pub wishlist: f32,
    pub purchase: f32,
    pub browsing: f32,
}

impl Default for ProfileWeights {
    fn default() -> Self {
        Self {
            wishlist: 0.40,
            purchase: 0.35,
            browsing: 0.25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    pub provider: String,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub candidate_count: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "claude".to_string(),
            model: None,
            api_key: None,
            temperature: 0.7,
            max_tokens: 4096,
            candidate_count: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub diversity_enabled: bool,
    pub max_per_category: usize,
    pub max_per_brand: usize,
    pub max_per_color: usize,
    /// Zero disables the trending boost.
    pub trending_boost_weight: f64,
    pub trending_period_days: u32,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            diversity_enabled: false,
            max_per_category: 3,
            max_per_brand: 2,
            max_per_color: 3,
            trending_boost_weight: 0.0,
            trending_period_days: 7,
        }
    }
}

impl RecommendationConfig {
    /// Read a JSON config file, falling back to defaults for missing keys.
    pub fn from_file(path: &Path) -> Result<Self, DomainError> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| {
            DomainError::configuration(format!("Invalid config file {}: {}", path.display(), e))
        })
    }

    /// Fill secrets the file left unset from the environment.
    pub fn with_env_overrides(mut self) -> Self {
        if self.llm.api_key.is_none() {
            let var = match self.llm.provider.as_str() {
                "openai" => "OPENAI_API_KEY",
                _ => "ANTHROPIC_API_KEY",
            };
            self.llm.api_key = std::env::var(var).ok().filter(|k| !k.is_empty());
        }
        self
    }

    /// Whether product recommendations of this type are switched on.
    pub fn is_type_enabled(&self, rec_type: RecommendationType) -> bool {
        if !self.general.enabled {
            return false;
        }
        match rec_type {
            RecommendationType::Related => self.similarity.related_enabled,
            RecommendationType::Crosssell => self.similarity.crosssell_enabled,
            RecommendationType::Upsell => self.similarity.upsell_enabled,
            RecommendationType::Browsing => self.personalization.browsing_enabled,
            RecommendationType::Purchase => self.personalization.purchase_enabled,
            RecommendationType::Wishlist => self.personalization.wishlist_enabled,
            RecommendationType::JustForYou => self.personalization.just_for_you_enabled,
        }
    }

    pub fn default_count(&self, rec_type: RecommendationType) -> usize {
        match rec_type {
            RecommendationType::Related => self.similarity.related_count,
            RecommendationType::Crosssell => self.similarity.crosssell_count,
            RecommendationType::Upsell => self.similarity.upsell_count,
            RecommendationType::Browsing => self.personalization.browsing_limit,
            RecommendationType::Purchase => self.personalization.purchase_limit,
            RecommendationType::Wishlist => self.personalization.wishlist_limit,
            RecommendationType::JustForYou => self.personalization.just_for_you_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = RecommendationConfig::default();
        assert_eq!(config.similarity.threshold, 0.5);
        assert_eq!(config.cache.lifetime_secs, 3600);
        assert_eq!(config.llm.candidate_count, 20);
        assert_eq!(config.personalization.just_for_you_limit, 12);
        assert_eq!(config.personalization.weights(), ProfileWeights::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"llm": {{"enabled": true, "temperature": 0.2}}, "similarity": {{"threshold": 0.65}}}}"#
        )
        .unwrap();

        let config = RecommendationConfig::from_file(file.path()).unwrap();
        assert!(config.llm.enabled);
        assert_eq!(config.llm.temperature, 0.2);
        assert_eq!(config.llm.max_tokens, 4096);
        assert_eq!(config.similarity.threshold, 0.65);
        assert_eq!(config.similarity.related_count, 8);
    }

    #[test]
    fn test_malformed_file_is_a_configuration_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();

        let err = RecommendationConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, DomainError::Configuration(_)));
    }

    #[test]
    fn test_master_switch_disables_all_types() {
        let mut config = RecommendationConfig::default();
        assert!(config.is_type_enabled(RecommendationType::Related));
        config.general.enabled = false;
        assert!(!config.is_type_enabled(RecommendationType::Related));
    }
}
