use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{unix_now, RecommendationType};
use crate::domain::DomainError;

/// Upper bound on source ids persisted with a profile.
pub const MAX_STORED_SOURCE_IDS: usize = 50;

/// Overlap above which a stored profile is reused as-is.
pub const PROFILE_REUSE_OVERLAP: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileType {
    Browsing,
    Purchase,
    Wishlist,
    JustForYou,
}

impl ProfileType {
    pub const ALL: [ProfileType; 4] = [
        Self::Browsing,
        Self::Purchase,
        Self::Wishlist,
        Self::JustForYou,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Browsing => "browsing",
            Self::Purchase => "purchase",
            Self::Wishlist => "wishlist",
            Self::JustForYou => "just_for_you",
        }
    }

    pub fn recommendation_type(&self) -> RecommendationType {
        match self {
            Self::Browsing => RecommendationType::Browsing,
            Self::Purchase => RecommendationType::Purchase,
            Self::Wishlist => RecommendationType::Wishlist,
            Self::JustForYou => RecommendationType::JustForYou,
        }
    }

    /// Distinct signal products required before recommending.
    pub fn min_signal_products(&self) -> usize {
        match self {
            Self::Wishlist => 1,
            _ => 2,
        }
    }
}

impl fmt::Display for ProfileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "browsing" => Ok(Self::Browsing),
            "purchase" => Ok(Self::Purchase),
            "wishlist" => Ok(Self::Wishlist),
            "just_for_you" | "combined" => Ok(Self::JustForYou),
            other => Err(DomainError::invalid_input(format!(
                "Unknown profile type: {}",
                other
            ))),
        }
    }
}

/// Persisted profile embedding for one customer, signal type and store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub customer_id: i64,
    pub profile_type: ProfileType,
    pub embedding: Vec<f32>,
    pub source_product_ids: Vec<i64>,
    pub product_count: usize,
    pub store_id: u32,
    pub created_at: i64,
    pub updated_at: i64,
}

impl CustomerProfile {
    pub fn new(
        customer_id: i64,
        profile_type: ProfileType,
        embedding: Vec<f32>,
        source_product_ids: &[i64],
        store_id: u32,
    ) -> Self {
        let now = unix_now();
        Self {
            customer_id,
            profile_type,
            embedding,
            source_product_ids: source_product_ids
                .iter()
                .copied()
                .take(MAX_STORED_SOURCE_IDS)
                .collect(),
            product_count: source_product_ids.len(),
            store_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// `|stored ∩ current| / |current|`; zero for an empty current set.
    pub fn overlap_with(&self, current_ids: &[i64]) -> f64 {
        let current: HashSet<i64> = current_ids.iter().copied().collect();
        if current.is_empty() {
            return 0.0;
        }
        let stored: HashSet<i64> = self.source_product_ids.iter().copied().collect();
        stored.intersection(&current).count() as f64 / current.len() as f64
    }

    pub fn is_reusable_for(&self, current_ids: &[i64]) -> bool {
        !self.embedding.is_empty() && self.overlap_with(current_ids) > PROFILE_REUSE_OVERLAP
    }
}
