use std::collections::{HashMap, HashSet};

use crate::application::RankingConfig;
use crate::domain::Product;

/// Caps how often one category, brand or color may appear in a result list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiversityFilter {
    pub max_per_category: usize,
    pub max_per_brand: usize,
    pub max_per_color: usize,
}

impl Default for DiversityFilter {
    fn default() -> Self {
        Self {
            max_per_category: 3,
            max_per_brand: 2,
            max_per_color: 3,
        }
    }
}

impl DiversityFilter {
    pub fn new(max_per_category: usize, max_per_brand: usize, max_per_color: usize) -> Self {
        Self {
            max_per_category,
            max_per_brand,
            max_per_color,
        }
    }

    pub fn from_config(config: &RankingConfig) -> Self {
        Self::new(config.max_per_category, config.max_per_brand, config.max_per_color)
    }

    /// Single greedy pass over score-ordered items; skipped items never
    /// reorder the rest.
    pub fn filter<T: AsRef<Product>>(&self, items: Vec<T>, limit: usize) -> Vec<T> {
        let mut per_category: HashMap<i64, usize> = HashMap::new();
        let mut per_brand: HashMap<String, usize> = HashMap::new();
        let mut per_color: HashMap<String, usize> = HashMap::new();
        let mut accepted = Vec::with_capacity(limit.min(items.len()));

        for item in items {
            if accepted.len() >= limit {
                break;
            }
            let product = item.as_ref();
            let category = product.primary_category_id();
            let brand = product.brand().map(str::to_lowercase);
            let color = product.color().map(str::to_lowercase);

            if at_cap(&per_category, category.as_ref(), self.max_per_category)
                || at_cap(&per_brand, brand.as_ref(), self.max_per_brand)
                || at_cap(&per_color, color.as_ref(), self.max_per_color)
            {
                continue;
            }

            if let Some(c) = category {
                *per_category.entry(c).or_default() += 1;
            }
            if let Some(b) = brand {
                *per_brand.entry(b).or_default() += 1;
            }
            if let Some(c) = color {
                *per_color.entry(c).or_default() += 1;
            }
            accepted.push(item);
        }

        accepted
    }

    /// `0.6·(unique categories / categorized) + 0.4·(unique brands / branded)`,
    /// rounded to four places. Lists of one or zero products score 1.
    pub fn diversity_score<T: AsRef<Product>>(items: &[T]) -> f64 {
        if items.len() <= 1 {
            return 1.0;
        }

        let categories: Vec<i64> = items.iter().filter_map(|i| i.as_ref().primary_category_id()).collect();
        let brands: Vec<String> = items
            .iter()
            .filter_map(|i| i.as_ref().brand().map(str::to_lowercase))
            .collect();

        let ratio = |unique: usize, total: usize| if total == 0 { 0.0 } else { unique as f64 / total as f64 };
        let category_ratio = ratio(categories.iter().collect::<HashSet<_>>().len(), categories.len());
        let brand_ratio = ratio(brands.iter().collect::<HashSet<_>>().len(), brands.len());

        let score = 0.6 * category_ratio + 0.4 * brand_ratio;
        (score * 10_000.0).round() / 10_000.0
    }
}

fn at_cap<K: std::hash::Hash + Eq>(counts: &HashMap<K, usize>, key: Option<&K>, cap: usize) -> bool {
    match key {
        Some(k) => counts.get(k).copied().unwrap_or(0) >= cap,
        None => false,
    }
}
