use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::{DiversityFilter, LlmReRanker, ProductTextBuilder, TrendingBooster};
use crate::application::{
    EmbeddingService, KeyValueCache, LlmRankingRepository, ProductCatalog, ProductQuery,
    RecommendationConfig, StoreDirectory, VectorRepository,
};
use crate::domain::{
    similarity_from_distance, CacheKey, CachedResult, DocumentId, DomainError, LlmRanking,
    Product, ProductLookup, RecommendationResult, RecommendationType, ShopperContext,
    WhereFilter, RECOMMENDATION_CACHE_TAG,
};

/// Extra neighbors requested beyond `limit` to survive exclusion filtering.
const QUERY_HEADROOM: usize = 10;
const SEARCH_HEADROOM: usize = 5;

tokio::task_local! {
    /// Type of the recommendation call running on the current task. Only
    /// set inside an entry point, so independent requests never see it.
    static ACTIVE_RECOMMENDATION: RecommendationType;
}

/// Product-to-product recommendations behind a three-tier lookup:
/// customer ranking record, shared cache, then fresh computation.
pub struct RecommendationService {
    catalog: Arc<dyn ProductCatalog>,
    embedding: Arc<dyn EmbeddingService>,
    vectors: Arc<dyn VectorRepository>,
    cache: Arc<dyn KeyValueCache>,
    rankings: Arc<dyn LlmRankingRepository>,
    stores: Arc<dyn StoreDirectory>,
    text_builder: ProductTextBuilder,
    reranker: Option<Arc<LlmReRanker>>,
    trending: Option<Arc<TrendingBooster>>,
    diversity: Option<DiversityFilter>,
    config: RecommendationConfig,
}

impl RecommendationService {
    pub fn new(
        catalog: Arc<dyn ProductCatalog>,
        embedding: Arc<dyn EmbeddingService>,
        vectors: Arc<dyn VectorRepository>,
        cache: Arc<dyn KeyValueCache>,
        rankings: Arc<dyn LlmRankingRepository>,
        stores: Arc<dyn StoreDirectory>,
        config: RecommendationConfig,
    ) -> Self {
        let diversity = config
            .ranking
            .diversity_enabled
            .then(|| DiversityFilter::from_config(&config.ranking));
        Self {
            catalog,
            embedding,
            vectors,
            cache,
            rankings,
            stores,
            text_builder: ProductTextBuilder::new(&config.text),
            reranker: None,
            trending: None,
            diversity,
            config,
        }
    }

    pub fn with_reranker(mut self, reranker: Arc<LlmReRanker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn with_trending(mut self, booster: Arc<TrendingBooster>) -> Self {
        self.trending = Some(booster);
        self
    }

    pub fn config(&self) -> &RecommendationConfig {
        &self.config
    }

    pub async fn related_products(
        &self,
        product: impl Into<ProductLookup>,
        limit: Option<usize>,
        store_id: u32,
        shopper: &ShopperContext,
    ) -> Vec<Product> {
        self.guarded(product.into(), RecommendationType::Related, limit, store_id, shopper)
            .await
    }

    pub async fn crosssell_products(
        &self,
        product: impl Into<ProductLookup>,
        limit: Option<usize>,
        store_id: u32,
        shopper: &ShopperContext,
    ) -> Vec<Product> {
        self.guarded(product.into(), RecommendationType::Crosssell, limit, store_id, shopper)
            .await
    }

    pub async fn upsell_products(
        &self,
        product: impl Into<ProductLookup>,
        limit: Option<usize>,
        store_id: u32,
        shopper: &ShopperContext,
    ) -> Vec<Product> {
        self.guarded(product.into(), RecommendationType::Upsell, limit, store_id, shopper)
            .await
    }

    async fn guarded(
        &self,
        product: ProductLookup,
        rec_type: RecommendationType,
        limit: Option<usize>,
        store_id: u32,
        shopper: &ShopperContext,
    ) -> Vec<Product> {
        if let Ok(outer) = ACTIVE_RECOMMENDATION.try_with(|t| *t) {
            debug!(%rec_type, %outer, "Recommendation already in progress, skipping nested call");
            return Vec::new();
        }
        if !self.config.is_type_enabled(rec_type) {
            return Vec::new();
        }

        let limit = limit.unwrap_or_else(|| self.config.default_count(rec_type));
        ACTIVE_RECOMMENDATION
            .scope(
                rec_type,
                self.get_recommendations(product, rec_type, Some(limit), store_id, shopper),
            )
            .await
    }

    pub async fn get_recommendations(
        &self,
        product: impl Into<ProductLookup>,
        rec_type: RecommendationType,
        limit: Option<usize>,
        store_id: u32,
        shopper: &ShopperContext,
    ) -> Vec<Product> {
        self.get_recommendations_with_scores(product, rec_type, limit, store_id, shopper)
            .await
            .into_iter()
            .map(|r| r.product)
            .collect()
    }

    /// Scored recommendations for a source product. Never fails: any
    /// internal error is logged and yields an empty list.
    pub async fn get_recommendations_with_scores(
        &self,
        product: impl Into<ProductLookup>,
        rec_type: RecommendationType,
        limit: Option<usize>,
        store_id: u32,
        shopper: &ShopperContext,
    ) -> Vec<RecommendationResult> {
        let limit = limit.unwrap_or_else(|| self.config.default_count(rec_type));
        if limit == 0 {
            return Vec::new();
        }

        let Some(source) = self.resolve_product(product.into(), store_id).await else {
            return Vec::new();
        };

        // Stored lists are keyed without the cart, so exclusions are
        // reapplied on every tier.
        let mut excluded: HashSet<i64> = shopper.cart_product_ids.iter().copied().collect();
        excluded.insert(source.id);

        if let Some(customer_id) = shopper.customer_id {
            if let Some(results) = self
                .from_ranking_record(source.id, customer_id, rec_type, limit, store_id, &excluded)
                .await
            {
                return results;
            }
        }

        let cache_key = CacheKey::recommendation(source.id, rec_type, store_id);
        if self.config.cache.enabled {
            if let Some(results) = self
                .from_cache(&cache_key, rec_type, limit, store_id, &excluded)
                .await
            {
                return results;
            }
        }

        let results = match self
            .compute(&source, rec_type, limit, store_id, shopper, &excluded)
            .await
        {
            Ok(results) => results,
            Err(e) => {
                warn!(
                    product_id = source.id,
                    %rec_type,
                    "Recommendation computation failed: {}",
                    e
                );
                return Vec::new();
            }
        };

        if !results.is_empty() {
            if let Some(customer_id) = shopper.customer_id {
                self.save_ranking_record(&source, customer_id, rec_type, store_id, &results)
                    .await;
            }
            if self.config.cache.enabled {
                self.save_to_cache(&cache_key, &results).await;
            }
        }

        info!(
            product_id = source.id,
            %rec_type,
            store_id,
            count = results.len(),
            "Computed recommendations"
        );
        results
    }

    async fn resolve_product(&self, lookup: ProductLookup, store_id: u32) -> Option<Product> {
        match lookup {
            ProductLookup::Product(product) => Some(product),
            ProductLookup::Id(id) => match self.catalog.get_by_id(id, store_id).await {
                Ok(Some(product)) => Some(product),
                Ok(None) => {
                    debug!("Source product {} not found in store {}", id, store_id);
                    None
                }
                Err(e) => {
                    warn!("Failed to load source product {}: {}", id, e);
                    None
                }
            },
        }
    }

    /// Results from a stored ranking record. Scores and LLM annotations come
    /// from the record's `results` metadata; ids missing there (records
    /// written by other tools) are served unscored.
    async fn from_ranking_record(
        &self,
        product_id: i64,
        customer_id: i64,
        rec_type: RecommendationType,
        limit: usize,
        store_id: u32,
        excluded: &HashSet<i64>,
    ) -> Option<Vec<RecommendationResult>> {
        let ranking = match self
            .rankings
            .get_by_product_and_customer(product_id, customer_id, rec_type, store_id)
            .await
        {
            Ok(Some(ranking)) if !ranking.is_expired() => ranking,
            Ok(_) => return None,
            Err(e) => {
                warn!("Ranking record lookup failed: {}", e);
                return None;
            }
        };

        debug!(product_id, customer_id, %rec_type, "Serving stored ranking record");
        let mut stored: HashMap<i64, CachedResult> = ranking
            .metadata
            .get("results")
            .cloned()
            .and_then(|v| serde_json::from_value::<Vec<CachedResult>>(v).ok())
            .unwrap_or_default()
            .into_iter()
            .map(|c| (c.product_id, c))
            .collect();
        let cached: Vec<CachedResult> = ranking
            .ranked_product_ids
            .iter()
            .map(|id| {
                stored.remove(id).unwrap_or_else(|| CachedResult {
                    product_id: *id,
                    score: 0.0,
                    distance: 0.0,
                    recommendation_type: rec_type,
                    metadata: Map::new(),
                })
            })
            .collect();
        Some(self.hydrate(cached, rec_type, limit, store_id, excluded).await)
    }

    async fn from_cache(
        &self,
        key: &str,
        rec_type: RecommendationType,
        limit: usize,
        store_id: u32,
        excluded: &HashSet<i64>,
    ) -> Option<Vec<RecommendationResult>> {
        let raw = match self.cache.load(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key, "Recommendation cache miss");
                return None;
            }
            Err(e) => {
                warn!("Recommendation cache read failed: {}", e);
                return None;
            }
        };

        match serde_json::from_str::<Vec<CachedResult>>(&raw) {
            Ok(cached) => {
                debug!(key, "Recommendation cache hit");
                Some(self.hydrate(cached, rec_type, limit, store_id, excluded).await)
            }
            Err(e) => {
                warn!("Discarding unreadable cache entry {}: {}", key, e);
                None
            }
        }
    }

    /// Reload products for stored results, keeping stored order.
    async fn hydrate(
        &self,
        cached: Vec<CachedResult>,
        rec_type: RecommendationType,
        limit: usize,
        store_id: u32,
        excluded: &HashSet<i64>,
    ) -> Vec<RecommendationResult> {
        let cached: Vec<CachedResult> = cached
            .into_iter()
            .filter(|c| !excluded.contains(&c.product_id))
            .take(limit)
            .collect();
        let ids: Vec<i64> = cached.iter().map(|c| c.product_id).collect();
        let mut products = self.load_in_order(ProductQuery::by_ids(ids, store_id).salable()).await;

        cached
            .into_iter()
            .filter_map(|entry| {
                let product = products.remove(&entry.product_id)?;
                let mut result = entry.hydrate(product);
                result.recommendation_type = rec_type;
                Some(result)
            })
            .collect()
    }

    async fn load_in_order(&self, query: ProductQuery) -> HashMap<i64, Product> {
        if query.ids.is_empty() {
            return HashMap::new();
        }
        match self.catalog.query(&query).await {
            Ok(products) => products.into_iter().map(|p| (p.id, p)).collect(),
            Err(e) => {
                warn!("Failed to load products: {}", e);
                HashMap::new()
            }
        }
    }

    async fn compute(
        &self,
        source: &Product,
        rec_type: RecommendationType,
        limit: usize,
        store_id: u32,
        shopper: &ShopperContext,
        excluded: &HashSet<i64>,
    ) -> Result<Vec<RecommendationResult>, DomainError> {
        let text = self.text_builder.build(source);
        if text.is_empty() {
            debug!("Product {} has no embeddable text", source.id);
            return Ok(Vec::new());
        }

        let query_embedding = self.embedding.embed_one(&text).await;
        if query_embedding.is_empty() {
            warn!("No embedding for product {}, skipping recommendations", source.id);
            return Ok(Vec::new());
        }

        let collection = self
            .vectors
            .get_or_create_collection(&self.config.general.collection_name, None)
            .await?;
        let filter = WhereFilter::all(vec![
            WhereFilter::ne("product_id", source.id),
            WhereFilter::eq("store_id", store_id),
        ]);
        let matches = self
            .vectors
            .query(&collection, &[query_embedding], limit + QUERY_HEADROOM, filter.as_ref())
            .await
            .into_iter()
            .next()
            .unwrap_or_default();

        let mut candidate_ids = Vec::new();
        let mut distances: HashMap<i64, f32> = HashMap::new();
        for m in matches {
            let Some(product_id) = DocumentId::parse(&m.id) else {
                continue;
            };
            if excluded.contains(&product_id) || distances.contains_key(&product_id) {
                continue;
            }
            candidate_ids.push(product_id);
            distances.insert(product_id, m.distance.unwrap_or(1.0));
        }
        if candidate_ids.is_empty() {
            return Ok(Vec::new());
        }

        let products = self
            .load_candidates(&candidate_ids, source, rec_type, store_id)
            .await?;

        let threshold = self.config.similarity.threshold;
        let keep_all = self.boost_weight() > 0.0 || self.diversity.is_some();
        let mut results = Vec::new();
        for product in products {
            let distance = distances.get(&product.id).copied().unwrap_or(1.0);
            let score = similarity_from_distance(distance);
            if score < threshold {
                continue;
            }
            results.push(
                RecommendationResult::new(product, score, distance, rec_type)
                    .with_metadata("source_product_id", source.id)
                    .with_metadata("store_id", store_id),
            );
            if !keep_all && results.len() >= limit {
                break;
            }
        }

        if let Some(trending) = self.trending.as_ref().filter(|_| self.boost_weight() > 0.0) {
            results = boost_results(trending, results, store_id, self.boost_weight()).await;
        }
        if let Some(diversity) = &self.diversity {
            results = diversity.filter(results, limit);
        }
        results.truncate(limit);

        if let Some(reranker) = self.reranker.as_ref().filter(|r| r.is_enabled()) {
            if !results.is_empty() {
                results = reranker
                    .rerank(source, results, rec_type, shopper, limit, store_id)
                    .await;
            }
        }

        Ok(results)
    }

    fn boost_weight(&self) -> f64 {
        if self.trending.is_some() {
            self.config.ranking.trending_boost_weight
        } else {
            0.0
        }
    }

    /// Salable candidates in vector order, with type-specific filters.
    async fn load_candidates(
        &self,
        ids: &[i64],
        source: &Product,
        rec_type: RecommendationType,
        store_id: u32,
    ) -> Result<Vec<Product>, DomainError> {
        let mut query = ProductQuery::by_ids(ids.to_vec(), store_id).salable();
        let upsell_threshold = self.config.similarity.upsell_price_threshold_percent;
        if rec_type == RecommendationType::Upsell && upsell_threshold > 0.0 && source.price > 0.0 {
            query = query.with_min_price(source.price * (1.0 + upsell_threshold / 100.0));
        }

        let mut by_id: HashMap<i64, Product> = self
            .catalog
            .query(&query)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let exclude_categories = rec_type == RecommendationType::Crosssell
            && self.config.similarity.exclude_same_category_for_crosssell;

        Ok(ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .filter(|p| {
                !exclude_categories
                    || !p.category_ids.iter().any(|c| source.category_ids.contains(c))
            })
            .collect())
    }

    async fn save_ranking_record(
        &self,
        source: &Product,
        customer_id: i64,
        rec_type: RecommendationType,
        store_id: u32,
        results: &[RecommendationResult],
    ) {
        let ranked_ids: Vec<i64> = results.iter().map(|r| r.product_id()).collect();
        let mut metadata = Map::new();
        metadata.insert("generated_at".into(), Value::from(Utc::now().to_rfc3339()));
        metadata.insert("result_count".into(), Value::from(results.len()));
        metadata.insert(
            "llm_enabled".into(),
            Value::from(self.reranker.as_ref().is_some_and(|r| r.is_enabled())),
        );
        let scored: Vec<CachedResult> = results.iter().map(RecommendationResult::dehydrate).collect();
        match serde_json::to_value(&scored) {
            Ok(value) => {
                metadata.insert("results".into(), value);
            }
            Err(e) => warn!("Failed to serialize ranked results: {}", e),
        }

        let first = &results[0].metadata;
        let model = first.get("llm_model").and_then(Value::as_str).map(str::to_string);
        let cost = first.get("llm_cost").and_then(Value::as_f64);

        let ranking = LlmRanking::new(customer_id, source.id, rec_type, store_id, ranked_ids)
            .with_ttl(self.config.cache.lifetime_secs)
            .with_metadata(metadata)
            .with_model(model, cost);

        if let Err(e) = self.rankings.save(&ranking).await {
            warn!("Failed to persist ranking record: {}", e);
        }
    }

    async fn save_to_cache(&self, key: &str, results: &[RecommendationResult]) {
        let payload: Vec<CachedResult> = results.iter().map(RecommendationResult::dehydrate).collect();
        let raw = match serde_json::to_string(&payload) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to serialize recommendations: {}", e);
                return;
            }
        };
        let ttl = Duration::from_secs(self.config.cache.lifetime_secs);
        if let Err(e) = self
            .cache
            .save(key, &raw, &[RECOMMENDATION_CACHE_TAG], Some(ttl))
            .await
        {
            warn!("Failed to cache recommendations under {}: {}", key, e);
        }
    }

    /// Free-text similarity search over the catalog.
    pub async fn similar_products_by_query(
        &self,
        query: &str,
        limit: usize,
        store_id: u32,
    ) -> Vec<Product> {
        if !self.config.general.enabled || query.trim().is_empty() || limit == 0 {
            return Vec::new();
        }

        let embedding = self.embedding.embed_one(query).await;
        if embedding.is_empty() {
            return Vec::new();
        }

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

        let filter = WhereFilter::eq("store_id", store_id);
        let matches = self
            .vectors
            .query(&collection, &[embedding], limit + SEARCH_HEADROOM, Some(&filter))
            .await
            .into_iter()
            .next()
            .unwrap_or_default();

        let mut seen = HashSet::new();
        let ids: Vec<i64> = matches
            .iter()
            .filter_map(|m| DocumentId::parse(&m.id))
            .filter(|id| seen.insert(*id))
            .collect();

        let mut products = self
            .load_in_order(ProductQuery::by_ids(ids.clone(), store_id).salable())
            .await;
        ids.iter()
            .filter_map(|id| products.remove(id))
            .take(limit)
            .collect()
    }

    /// Whether the product has a document in the vector store.
    pub async fn has_ai_recommendations(&self, product_id: i64, store_id: u32) -> bool {
        let collection = match self
            .vectors
            .get_or_create_collection(&self.config.general.collection_name, None)
            .await
        {
            Ok(collection) => collection,
            Err(_) => return false,
        };
        let ids = vec![
            DocumentId::format(product_id, store_id),
            format!("product_{}", product_id),
        ];
        !self.vectors.get(&collection, &ids).await.is_empty()
    }

    /// Drop every cached and stored ranking for one source product.
    pub async fn clear_cache(&self, product_id: i64) -> Result<(), DomainError> {
        let store_ids = self.stores.store_ids().await?;
        for rec_type in RecommendationType::PRODUCT_TYPES {
            for store_id in &store_ids {
                self.cache
                    .remove(&CacheKey::recommendation(product_id, rec_type, *store_id))
                    .await?;
            }
        }
        let removed = self.rankings.delete_by_product(product_id).await?;
        info!(
            product_id,
            stores = store_ids.len(),
            ranking_records = removed,
            "Cleared recommendation cache for product"
        );
        Ok(())
    }

    pub async fn clear_all_cache(&self) -> Result<usize, DomainError> {
        let removed = self.cache.clean_tag(RECOMMENDATION_CACHE_TAG).await?;
        info!(entries = removed, "Cleared all cached recommendations");
        Ok(removed)
    }
}

/// Reorder by trending-boosted score; the similarity score itself is kept
/// and the boosted value is recorded in metadata.
async fn boost_results(
    trending: &TrendingBooster,
    results: Vec<RecommendationResult>,
    store_id: u32,
    weight: f64,
) -> Vec<RecommendationResult> {
    let scores: Vec<(i64, f64)> = results.iter().map(|r| (r.product_id(), r.score as f64)).collect();
    let boosted = trending.apply_boost(scores, store_id, weight).await;

    let mut by_id: HashMap<i64, RecommendationResult> =
        results.into_iter().map(|r| (r.product_id(), r)).collect();
    boosted
        .into_iter()
        .filter_map(|(id, score)| {
            by_id
                .remove(&id)
                .map(|r| r.with_metadata("trending_boosted_score", score))
        })
        .collect()
}
