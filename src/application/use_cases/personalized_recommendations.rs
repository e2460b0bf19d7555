use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{ProfileBuilder, ProfileSignals};
use crate::application::{
    BehaviorCollector, ProductCatalog, ProductQuery, ProfileRepository,
    RecommendationCacheRepository, RecommendationConfig, VectorRepository,
};
use crate::domain::{
    unix_now, CachedRecommendation, DocumentId, DomainError, Product, ProfileType,
    ShopperContext, WhereFilter,
};

const DEFAULT_STALE_HOURS: i64 = 24;
const DEFAULT_STALE_BATCH: usize = 100;

/// The three behavior sources feeding customer profiles.
#[derive(Clone)]
pub struct BehaviorCollectors {
    pub browsing: Arc<dyn BehaviorCollector>,
    pub purchase: Arc<dyn BehaviorCollector>,
    pub wishlist: Arc<dyn BehaviorCollector>,
}

impl BehaviorCollectors {
    fn for_type(&self, profile_type: ProfileType) -> Option<&Arc<dyn BehaviorCollector>> {
        match profile_type {
            ProfileType::Browsing => Some(&self.browsing),
            ProfileType::Purchase => Some(&self.purchase),
            ProfileType::Wishlist => Some(&self.wishlist),
            ProfileType::JustForYou => None,
        }
    }
}

/// Customer-to-products recommendations built from behavior profiles.
pub struct PersonalizedRecommendationService {
    catalog: Arc<dyn ProductCatalog>,
    vectors: Arc<dyn VectorRepository>,
    results: Arc<dyn RecommendationCacheRepository>,
    profiles: Arc<dyn ProfileRepository>,
    builder: ProfileBuilder,
    collectors: BehaviorCollectors,
    config: RecommendationConfig,
}

impl PersonalizedRecommendationService {
    pub fn new(
        catalog: Arc<dyn ProductCatalog>,
        vectors: Arc<dyn VectorRepository>,
        results: Arc<dyn RecommendationCacheRepository>,
        profiles: Arc<dyn ProfileRepository>,
        builder: ProfileBuilder,
        collectors: BehaviorCollectors,
        config: RecommendationConfig,
    ) -> Self {
        Self {
            catalog,
            vectors,
            results,
            profiles,
            builder,
            collectors,
            config,
        }
    }

    /// "Inspired by your browsing". Works for guests through the session.
    pub async fn browsing_inspired(
        &self,
        shopper: &ShopperContext,
        limit: Option<usize>,
        store_id: u32,
        exclude: &[i64],
    ) -> Vec<Product> {
        self.single_signal(ProfileType::Browsing, shopper, limit, store_id, exclude)
            .await
    }

    pub async fn purchase_inspired(
        &self,
        shopper: &ShopperContext,
        limit: Option<usize>,
        store_id: u32,
        exclude: &[i64],
    ) -> Vec<Product> {
        if !shopper.is_logged_in() {
            return Vec::new();
        }
        self.single_signal(ProfileType::Purchase, shopper, limit, store_id, exclude)
            .await
    }

    pub async fn wishlist_inspired(
        &self,
        shopper: &ShopperContext,
        limit: Option<usize>,
        store_id: u32,
        exclude: &[i64],
    ) -> Vec<Product> {
        if !shopper.is_logged_in() {
            return Vec::new();
        }
        self.single_signal(ProfileType::Wishlist, shopper, limit, store_id, exclude)
            .await
    }

    /// Blend of wishlist, purchase and browsing profiles. Falls back to
    /// browsing-inspired results when no signal yields a profile.
    pub async fn just_for_you(
        &self,
        shopper: &ShopperContext,
        limit: Option<usize>,
        store_id: u32,
        exclude: &[i64],
    ) -> Vec<Product> {
        let profile_type = ProfileType::JustForYou;
        if !self.config.personalization.is_enabled(profile_type) {
            return Vec::new();
        }
        let limit = limit.unwrap_or_else(|| self.config.personalization.default_limit(profile_type));
        let use_cache = uses_canonical_cache(shopper, exclude);

        if use_cache {
            if let Some(cached) = self.cached(shopper, profile_type, limit, store_id).await {
                return cached;
            }
        }

        let window = self.config.personalization.history_window(profile_type);
        let wishlist = self.collect(&self.collectors.wishlist, shopper, window, store_id).await;
        let purchase = self.collect(&self.collectors.purchase, shopper, window, store_id).await;
        let browsing = self.collect(&self.collectors.browsing, shopper, window, store_id).await;

        if wishlist.is_empty() && purchase.is_empty() && browsing.is_empty() {
            debug!("No behavior signals, falling back to browsing recommendations");
            return self.browsing_inspired(shopper, Some(limit), store_id, exclude).await;
        }

        let signals = ProfileSignals::Combined {
            wishlist: &wishlist,
            purchase: &purchase,
            browsing: &browsing,
        };
        let embedding = self
            .builder
            .resolve(shopper.customer_id, profile_type, signals, store_id)
            .await;
        if embedding.is_empty() {
            return self.browsing_inspired(shopper, Some(limit), store_id, exclude).await;
        }

        let mut excluded: HashSet<i64> = signals.source_ids().into_iter().collect();
        excluded.extend(exclude.iter().copied());
        excluded.extend(shopper.cart_product_ids.iter().copied());

        let ids = self.query_similar(embedding, &excluded, limit + 10, store_id).await;
        self.finish(shopper, profile_type, ids, limit, store_id, use_cache)
            .await
    }

    async fn single_signal(
        &self,
        profile_type: ProfileType,
        shopper: &ShopperContext,
        limit: Option<usize>,
        store_id: u32,
        exclude: &[i64],
    ) -> Vec<Product> {
        if !self.config.personalization.is_enabled(profile_type) {
            return Vec::new();
        }
        let Some(collector) = self.collectors.for_type(profile_type) else {
            return Vec::new();
        };
        let limit = limit.unwrap_or_else(|| self.config.personalization.default_limit(profile_type));
        let use_cache = uses_canonical_cache(shopper, exclude);

        let window = self.config.personalization.history_window(profile_type);
        let signal_ids = self.collect(collector, shopper, window, store_id).await;
        if signal_ids.len() < profile_type.min_signal_products() {
            debug!(
                %profile_type,
                signals = signal_ids.len(),
                "Not enough behavior data for personalized recommendations"
            );
            return Vec::new();
        }

        if use_cache {
            if let Some(cached) = self.cached(shopper, profile_type, limit, store_id).await {
                return cached;
            }
        }

        let embedding = self
            .builder
            .resolve(
                shopper.customer_id,
                profile_type,
                ProfileSignals::Single(&signal_ids),
                store_id,
            )
            .await;
        if embedding.is_empty() {
            return Vec::new();
        }

        let mut excluded: HashSet<i64> = signal_ids.iter().copied().collect();
        excluded.extend(exclude.iter().copied());
        excluded.extend(shopper.cart_product_ids.iter().copied());

        let ids = self.query_similar(embedding, &excluded, limit + 5, store_id).await;
        self.finish(shopper, profile_type, ids, limit, store_id, use_cache)
            .await
    }

    async fn collect(
        &self,
        collector: &Arc<dyn BehaviorCollector>,
        shopper: &ShopperContext,
        limit: usize,
        store_id: u32,
    ) -> Vec<i64> {
        match collector.get_product_ids(shopper, limit, store_id).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Failed to collect {} signals: {}", collector.signal(), e);
                Vec::new()
            }
        }
    }

    async fn cached(
        &self,
        shopper: &ShopperContext,
        profile_type: ProfileType,
        limit: usize,
        store_id: u32,
    ) -> Option<Vec<Product>> {
        let customer_id = shopper.customer_id?;
        let entry = match self
            .results
            .find(customer_id, profile_type.recommendation_type(), store_id)
            .await
        {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                warn!("Personalized cache read failed: {}", e);
                return None;
            }
        };

        debug!(customer_id, %profile_type, "Serving cached personalized recommendations");
        let ids: Vec<i64> = entry.product_ids.into_iter().take(limit).collect();
        Some(self.load_products(&ids, limit, store_id).await)
    }

    async fn finish(
        &self,
        shopper: &ShopperContext,
        profile_type: ProfileType,
        ids: Vec<i64>,
        limit: usize,
        store_id: u32,
        use_cache: bool,
    ) -> Vec<Product> {
        let products = self.load_products(&ids, limit, store_id).await;

        let cacheable = use_cache && !products.is_empty();
        if let Some(customer_id) = shopper.customer_id.filter(|_| cacheable) {
            let entry = CachedRecommendation::new(
                customer_id,
                profile_type.recommendation_type(),
                store_id,
                products.iter().map(|p| p.id).collect(),
                self.config.cache.lifetime_secs,
            );
            if let Err(e) = self.results.save(&entry).await {
                warn!("Failed to cache personalized recommendations: {}", e);
            }
        }

        info!(
            customer_id = ?shopper.customer_id,
            %profile_type,
            count = products.len(),
            "Computed personalized recommendations"
        );
        products
    }

    /// Nearest product ids to `embedding`, never returning an excluded id.
    async fn query_similar(
        &self,
        embedding: Vec<f32>,
        excluded: &HashSet<i64>,
        wanted: usize,
        store_id: u32,
    ) -> Vec<i64> {
        let collection = match self
            .vectors
            .get_or_create_collection(&self.config.general.collection_name, None)
            .await
        {
            Ok(collection) => collection,
            Err(e) => {
                warn!("Vector collection unavailable: {}", e);
                return Vec::new();
            }
        };

        let n_results = (wanted * 3).max(wanted + excluded.len() * 2);
        let filter = WhereFilter::eq("store_id", store_id);
        let matches = self
            .vectors
            .query(&collection, &[embedding], n_results, Some(&filter))
            .await
            .into_iter()
            .next()
            .unwrap_or_default();

        let mut seen = HashSet::new();
        matches
            .iter()
            .filter_map(|m| DocumentId::parse(&m.id))
            .filter(|id| !excluded.contains(id) && seen.insert(*id))
            .take(wanted)
            .collect()
    }

    async fn load_products(&self, ids: &[i64], limit: usize, store_id: u32) -> Vec<Product> {
        if ids.is_empty() {
            return Vec::new();
        }
        let query = ProductQuery::by_ids(ids.to_vec(), store_id).salable();
        let mut by_id: HashMap<i64, Product> = match self.catalog.query(&query).await {
            Ok(products) => products.into_iter().map(|p| (p.id, p)).collect(),
            Err(e) => {
                warn!("Failed to load recommended products: {}", e);
                return Vec::new();
            }
        };
        ids.iter()
            .filter_map(|id| by_id.remove(id))
            .take(limit)
            .collect()
    }

    pub async fn has_enough_data(
        &self,
        shopper: &ShopperContext,
        profile_type: ProfileType,
        store_id: u32,
    ) -> bool {
        match self.collectors.for_type(profile_type) {
            Some(collector) if profile_type == ProfileType::Browsing => {
                collector.has_data(shopper, store_id).await
            }
            Some(collector) => shopper.is_logged_in() && collector.has_data(shopper, store_id).await,
            None => {
                shopper.is_logged_in()
                    && (self.collectors.wishlist.has_data(shopper, store_id).await
                        || self.collectors.purchase.has_data(shopper, store_id).await
                        || self.collectors.browsing.has_data(shopper, store_id).await)
            }
        }
    }

    /// Drop the stored profile and cached results, then rebuild them.
    pub async fn refresh_profile(
        &self,
        customer_id: i64,
        profile_type: ProfileType,
        store_id: u32,
    ) -> Result<(), DomainError> {
        self.profiles
            .delete(customer_id, Some(profile_type), Some(store_id))
            .await?;
        self.results
            .delete(customer_id, Some(profile_type.recommendation_type()))
            .await?;

        let shopper = ShopperContext::customer(customer_id);
        match profile_type {
            ProfileType::JustForYou => self.just_for_you(&shopper, Some(1), store_id, &[]).await,
            other => self.single_signal(other, &shopper, Some(1), store_id, &[]).await,
        };
        info!(customer_id, %profile_type, store_id, "Refreshed customer profile");
        Ok(())
    }

    pub async fn clear_cache(
        &self,
        customer_id: i64,
        profile_type: Option<ProfileType>,
    ) -> Result<usize, DomainError> {
        self.results
            .delete(customer_id, profile_type.map(|t| t.recommendation_type()))
            .await
    }

    /// Rebuild profiles not updated within `max_age_hours`. Returns how many
    /// were refreshed.
    pub async fn refresh_stale_profiles(
        &self,
        max_age_hours: Option<i64>,
        limit: Option<usize>,
    ) -> Result<usize, DomainError> {
        let cutoff = unix_now() - max_age_hours.unwrap_or(DEFAULT_STALE_HOURS) * 3600;
        let stale = self
            .profiles
            .find_stale(cutoff, limit.unwrap_or(DEFAULT_STALE_BATCH))
            .await?;

        let mut refreshed = 0;
        for profile in stale {
            match self
                .refresh_profile(profile.customer_id, profile.profile_type, profile.store_id)
                .await
            {
                Ok(()) => refreshed += 1,
                Err(e) => warn!(
                    "Failed to refresh profile for customer {}: {}",
                    profile.customer_id, e
                ),
            }
        }
        Ok(refreshed)
    }

    pub async fn delete_expired_cache(&self) -> Result<usize, DomainError> {
        let removed = self.results.delete_expired().await?;
        info!(removed, "Deleted expired personalized cache entries");
        Ok(removed)
    }
}

/// Cached lists are per (customer, type, store); a call with its own
/// exclusions or a non-empty cart neither reads nor writes them.
fn uses_canonical_cache(shopper: &ShopperContext, exclude: &[i64]) -> bool {
    exclude.is_empty() && shopper.cart_product_ids.is_empty()
}
