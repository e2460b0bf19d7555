//! Integration tests for product-to-product recommendations.
//!
//! The vector store is scripted so each test controls exactly which
//! neighbors come back and at what distance.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use shoprec::application::{
    CircuitBreaker, CollectionHandle, Completion, CompletionRequest, EmbeddingService,
    LlmProvider, LlmRankingRepository, LlmReRanker, RecommendationConfig, RecommendationService,
    TrendingBooster, TrendingRepository, VectorDocument, VectorMatch, VectorRepository,
};
use shoprec::connector::{
    DuckdbLlmRankingRepository, InMemoryKeyValueCache, InMemoryProductCatalog,
    InMemoryVectorRepository, MockEmbedding, StaticStoreDirectory,
};
use shoprec::domain::{
    DocumentId, DomainError, EmbeddingConfig, Product, RecommendationType, SalesAggregate,
    ShopperContext, TrendingScore, WhereFilter,
};

/// Returns the same neighbors for every query and counts the calls.
struct ScriptedVectorRepository {
    matches: Vec<(i64, f32)>,
    queries: AtomicUsize,
}

impl ScriptedVectorRepository {
    fn new(matches: Vec<(i64, f32)>) -> Self {
        Self {
            matches,
            queries: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VectorRepository for ScriptedVectorRepository {
    async fn get_or_create_collection(
        &self,
        name: &str,
        _metadata: Option<Map<String, Value>>,
    ) -> Result<CollectionHandle, DomainError> {
        Ok(CollectionHandle {
            id: format!("{name}-id"),
            name: name.to_string(),
        })
    }

    async fn upsert(
        &self,
        _collection: &CollectionHandle,
        _documents: &[VectorDocument],
    ) -> Result<(), DomainError> {
        Ok(())
    }

    async fn delete(&self, _collection: &CollectionHandle, _ids: &[String]) -> Result<(), DomainError> {
        Ok(())
    }

    async fn query(
        &self,
        _collection: &CollectionHandle,
        _query_embeddings: &[Vec<f32>],
        _n_results: usize,
        _filter: Option<&WhereFilter>,
    ) -> Vec<Vec<VectorMatch>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        vec![self
            .matches
            .iter()
            .map(|(id, distance)| VectorMatch {
                id: DocumentId::format(*id, 1),
                distance: Some(*distance),
                metadata: Map::new(),
            })
            .collect()]
    }

    async fn get(&self, _collection: &CollectionHandle, _ids: &[String]) -> Vec<VectorMatch> {
        Vec::new()
    }

    async fn count(&self, _collection: &CollectionHandle) -> usize {
        self.matches.len()
    }

    async fn heartbeat(&self) -> Result<(), DomainError> {
        Ok(())
    }
}

/// Mock embeddings that count how often they are asked for.
struct CountingEmbedding {
    inner: MockEmbedding,
    calls: AtomicUsize,
    latency: Duration,
}

impl CountingEmbedding {
    fn new() -> Self {
        Self {
            inner: MockEmbedding::new(),
            calls: AtomicUsize::new(0),
            latency: Duration::ZERO,
        }
    }

    fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::new()
        }
    }
}

#[async_trait]
impl EmbeddingService for CountingEmbedding {
    async fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.inner.embed(texts).await
    }

    async fn health_check(&self) -> Result<(), DomainError> {
        Ok(())
    }

    fn config(&self) -> &EmbeddingConfig {
        self.inner.config()
    }
}

/// Answers every prompt with the same completion.
struct ScriptedProvider {
    reply: String,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn send_prompt(&self, _request: &CompletionRequest) -> Result<Completion, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Completion {
            text: self.reply.clone(),
            model: "scripted-model".to_string(),
            input_tokens: 400,
            output_tokens: 100,
        })
    }

    fn is_available(&self) -> bool {
        true
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    fn estimate_cost(&self, _completion: &Completion) -> f64 {
        0.002
    }
}

/// Serves a fixed trending score map.
struct FixedTrending(HashMap<i64, f64>);

#[async_trait]
impl TrendingRepository for FixedTrending {
    async fn aggregate_sales(&self, _store_id: u32, _since: i64) -> Result<Vec<SalesAggregate>, DomainError> {
        Ok(Vec::new())
    }

    async fn replace_scores(
        &self,
        _store_id: u32,
        _period_days: u32,
        _scores: &[TrendingScore],
    ) -> Result<(), DomainError> {
        Ok(())
    }

    async fn score_map(&self, _store_id: u32, _period_days: u32) -> Result<HashMap<i64, f64>, DomainError> {
        Ok(self.0.clone())
    }

    async fn top(
        &self,
        _store_id: u32,
        _period_days: u32,
        _limit: usize,
    ) -> Result<Vec<TrendingScore>, DomainError> {
        Ok(Vec::new())
    }
}

struct TestEnv {
    service: RecommendationService,
    vectors: Arc<ScriptedVectorRepository>,
    embedding: Arc<CountingEmbedding>,
    rankings: Arc<DuckdbLlmRankingRepository>,
}

async fn catalog(products: Vec<Product>) -> Arc<InMemoryProductCatalog> {
    let catalog = InMemoryProductCatalog::new();
    for product in products {
        catalog.insert(product).await;
    }
    Arc::new(catalog)
}

fn default_products() -> Vec<Product> {
    vec![
        Product::new(10, "DESK-10", "Oak standing desk", 300.0),
        Product::new(20, "DESK-20", "Walnut standing desk", 320.0),
        Product::new(30, "LAMP-30", "Desk lamp", 40.0),
    ]
}

async fn setup_test_env(
    products: Vec<Product>,
    matches: Vec<(i64, f32)>,
    config: RecommendationConfig,
) -> TestEnv {
    setup_test_env_with_embedding(products, matches, config, CountingEmbedding::new()).await
}

async fn setup_test_env_with_embedding(
    products: Vec<Product>,
    matches: Vec<(i64, f32)>,
    config: RecommendationConfig,
    embedding: CountingEmbedding,
) -> TestEnv {
    let vectors = Arc::new(ScriptedVectorRepository::new(matches));
    let embedding = Arc::new(embedding);
    let rankings = Arc::new(DuckdbLlmRankingRepository::in_memory().expect("duckdb init"));

    let service = RecommendationService::new(
        catalog(products).await,
        embedding.clone(),
        vectors.clone(),
        Arc::new(InMemoryKeyValueCache::new()),
        rankings.clone(),
        Arc::new(StaticStoreDirectory::new(vec![1, 2])),
        config,
    );

    TestEnv {
        service,
        vectors,
        embedding,
        rankings,
    }
}

fn ids(products: &[Product]) -> Vec<i64> {
    products.iter().map(|p| p.id).collect()
}

#[tokio::test]
async fn test_source_and_cart_items_are_excluded_before_threshold() {
    let mut config = RecommendationConfig::default();
    config.similarity.threshold = 0.5;
    let env = setup_test_env(
        default_products(),
        vec![(20, 0.1), (10, 0.0), (30, 0.5)],
        config,
    )
    .await;

    let shopper = ShopperContext::guest("s1").with_cart(vec![30]);
    let products = env
        .service
        .related_products(10, None, 1, &shopper)
        .await;

    assert_eq!(ids(&products), vec![20]);
}

#[tokio::test]
async fn test_second_call_is_served_from_cache() {
    let env = setup_test_env(
        default_products(),
        vec![(20, 0.1), (30, 0.3)],
        RecommendationConfig::default(),
    )
    .await;
    let shopper = ShopperContext::guest("s1");

    let first = env.service.related_products(10, None, 1, &shopper).await;
    let embeds_after_first = env.embedding.calls.load(Ordering::SeqCst);
    let second = env.service.related_products(10, None, 1, &shopper).await;

    assert_eq!(ids(&first), vec![20, 30]);
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(env.embedding.calls.load(Ordering::SeqCst), embeds_after_first);
    assert_eq!(env.vectors.queries.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cached_list_still_excludes_cart_items() {
    let env = setup_test_env(
        default_products(),
        vec![(20, 0.1), (30, 0.3)],
        RecommendationConfig::default(),
    )
    .await;

    let first = env
        .service
        .related_products(10, None, 1, &ShopperContext::guest("s1"))
        .await;
    assert_eq!(ids(&first), vec![20, 30]);

    let with_cart = ShopperContext::guest("s1").with_cart(vec![30]);
    let second = env.service.related_products(10, None, 1, &with_cart).await;
    assert_eq!(ids(&second), vec![20]);
    assert_eq!(env.vectors.queries.load(Ordering::SeqCst), 1);

    let again = env
        .service
        .related_products(10, None, 1, &ShopperContext::guest("s1"))
        .await;
    assert_eq!(ids(&again), vec![20, 30]);
}

#[tokio::test]
async fn test_ranking_record_still_excludes_cart_items() {
    let mut config = RecommendationConfig::default();
    config.cache.enabled = false;
    let env = setup_test_env(default_products(), vec![(30, 0.1), (20, 0.2)], config).await;

    let first = env
        .service
        .related_products(10, None, 1, &ShopperContext::customer(7))
        .await;
    assert_eq!(ids(&first), vec![30, 20]);

    let with_cart = ShopperContext::customer(7).with_cart(vec![30]);
    let second = env.service.related_products(10, None, 1, &with_cart).await;
    assert_eq!(ids(&second), vec![20]);
    assert_eq!(env.vectors.queries.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_requests_do_not_block_each_other() {
    let env = setup_test_env_with_embedding(
        default_products(),
        vec![(20, 0.1), (30, 0.3)],
        RecommendationConfig::default(),
        CountingEmbedding::with_latency(Duration::from_millis(50)),
    )
    .await;
    let shopper = ShopperContext::default();

    let (a, b) = tokio::join!(
        env.service.related_products(10, None, 1, &shopper),
        env.service.related_products(20, None, 1, &shopper),
    );

    assert_eq!(ids(&a), vec![20, 30]);
    assert_eq!(ids(&b), vec![30]);
}

#[tokio::test]
async fn test_reranked_results_keep_llm_annotations() {
    let mut config = RecommendationConfig::default();
    config.llm.enabled = true;
    let env = setup_test_env(default_products(), vec![(20, 0.1), (30, 0.2)], config.clone()).await;
    let provider = Arc::new(ScriptedProvider::new(
        r#"{"rankings":[{"product_id":30,"rank":1,"reason":"lights the desk"},{"product_id":20,"rank":2,"reason":"similar desk"}]}"#,
    ));
    let breaker = Arc::new(CircuitBreaker::new(Arc::new(InMemoryKeyValueCache::new())));
    let llm: Arc<dyn LlmProvider> = provider.clone();
    let reranker = LlmReRanker::new(Some(llm), breaker, config.llm.clone());
    let service = env.service.with_reranker(Arc::new(reranker));
    let shopper = ShopperContext::customer(7);

    let results = service
        .get_recommendations_with_scores(10, RecommendationType::Related, None, 1, &shopper)
        .await;
    assert_eq!(results.iter().map(|r| r.product.id).collect::<Vec<_>>(), vec![30, 20]);
    assert_eq!(results[0].metadata["llm_rank"], 1);
    assert_eq!(results[0].metadata["llm_reason"], "lights the desk");
    assert_eq!(results[0].metadata["llm_model"], "scripted-model");
    assert_eq!(results[0].metadata["llm_cost"], 0.002);

    let stored = env
        .rankings
        .get_by_product_and_customer(10, 7, RecommendationType::Related, 1)
        .await
        .expect("lookup")
        .expect("ranking stored");
    assert_eq!(stored.ranked_product_ids, vec![30, 20]);
    assert_eq!(stored.model_used.as_deref(), Some("scripted-model"));
    assert_eq!(stored.estimated_cost, Some(0.002));
    assert_eq!(stored.metadata.get("llm_enabled"), Some(&Value::from(true)));

    let reused = service
        .get_recommendations_with_scores(10, RecommendationType::Related, None, 1, &shopper)
        .await;
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    assert_eq!(reused.iter().map(|r| r.product.id).collect::<Vec<_>>(), vec![30, 20]);
    assert!((reused[0].score - 1.0 / 1.2).abs() < 1e-6);
    assert!((reused[0].distance - 0.2).abs() < 1e-6);
    assert_eq!(reused[0].metadata["llm_rank"], 1);
}

#[tokio::test]
async fn test_diversity_caps_repeated_categories() {
    let mut config = RecommendationConfig::default();
    config.ranking.diversity_enabled = true;
    config.ranking.max_per_category = 1;
    let products = vec![
        Product::new(10, "DESK-10", "Oak standing desk", 300.0).with_category(5, "Desks"),
        Product::new(20, "DESK-20", "Walnut standing desk", 320.0).with_category(5, "Desks"),
        Product::new(30, "DESK-30", "Pine standing desk", 280.0).with_category(5, "Desks"),
        Product::new(40, "LAMP-40", "Desk lamp", 40.0).with_category(6, "Lamps"),
    ];
    let env = setup_test_env(products, vec![(20, 0.1), (30, 0.2), (40, 0.3)], config).await;

    let related = env
        .service
        .related_products(10, Some(3), 1, &ShopperContext::default())
        .await;

    assert_eq!(ids(&related), vec![20, 40]);
}

#[tokio::test]
async fn test_trending_boost_reorders_candidates() {
    let mut config = RecommendationConfig::default();
    config.ranking.trending_boost_weight = 1.0;
    let env = setup_test_env(default_products(), vec![(20, 0.1), (30, 0.2)], config).await;
    let booster = TrendingBooster::new(Arc::new(FixedTrending(HashMap::from([(30, 1.0)]))));
    let service = env.service.with_trending(Arc::new(booster));

    let results = service
        .get_recommendations_with_scores(10, RecommendationType::Related, None, 1, &ShopperContext::default())
        .await;

    assert_eq!(results.iter().map(|r| r.product.id).collect::<Vec<_>>(), vec![30, 20]);
    assert!((results[0].score - 1.0 / 1.2).abs() < 1e-6);
    assert!(results[0].metadata.contains_key("trending_boosted_score"));
}

#[tokio::test]
async fn test_scores_below_threshold_are_dropped() {
    let mut config = RecommendationConfig::default();
    config.similarity.threshold = 0.5;
    let env = setup_test_env(default_products(), vec![(20, 0.2), (30, 1.5)], config).await;

    let results = env
        .service
        .get_recommendations_with_scores(
            10,
            RecommendationType::Related,
            None,
            1,
            &ShopperContext::default(),
        )
        .await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].product.id, 20);
    assert!(results.iter().all(|r| r.score >= 0.5));
    assert!((results[0].score - 1.0 / 1.2).abs() < 1e-6);
}

#[tokio::test]
async fn test_upsell_only_returns_pricier_products() {
    let mut products = default_products();
    products.push(Product::new(40, "DESK-40", "Electric standing desk", 450.0));
    let env = setup_test_env(
        products,
        vec![(20, 0.1), (40, 0.2)],
        RecommendationConfig::default(),
    )
    .await;

    let upsell = env
        .service
        .upsell_products(10, None, 1, &ShopperContext::default())
        .await;

    // 320 is within 10% of 300, so only the 450 desk qualifies
    assert_eq!(ids(&upsell), vec![40]);
}

#[tokio::test]
async fn test_unsalable_candidates_are_skipped() {
    let mut products = default_products();
    products.push(Product::new(50, "DESK-50", "Sold out desk", 310.0).with_stock(false));
    let env = setup_test_env(
        products,
        vec![(50, 0.05), (20, 0.1)],
        RecommendationConfig::default(),
    )
    .await;

    let related = env
        .service
        .related_products(10, None, 1, &ShopperContext::default())
        .await;

    assert_eq!(ids(&related), vec![20]);
}

#[tokio::test]
async fn test_customer_ranking_record_is_reused_without_cache() {
    let mut config = RecommendationConfig::default();
    config.cache.enabled = false;
    let env = setup_test_env(default_products(), vec![(30, 0.1), (20, 0.2)], config).await;
    let shopper = ShopperContext::customer(7);

    let first = env.service.related_products(10, None, 1, &shopper).await;
    let stored = env
        .rankings
        .get_by_product_and_customer(10, 7, RecommendationType::Related, 1)
        .await
        .expect("lookup")
        .expect("ranking stored");
    assert_eq!(stored.ranked_product_ids, vec![30, 20]);
    assert_eq!(stored.metadata.get("result_count"), Some(&Value::from(2)));
    assert_eq!(stored.metadata.get("llm_enabled"), Some(&Value::from(false)));

    let second = env.service.related_products(10, None, 1, &shopper).await;
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(env.vectors.queries.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_results_are_not_cached() {
    let env = setup_test_env(default_products(), Vec::new(), RecommendationConfig::default()).await;
    let shopper = ShopperContext::customer(7);

    assert!(env.service.related_products(10, None, 1, &shopper).await.is_empty());
    assert!(env.service.related_products(10, None, 1, &shopper).await.is_empty());

    assert_eq!(env.vectors.queries.load(Ordering::SeqCst), 2);
    let stored = env
        .rankings
        .get_by_product_and_customer(10, 7, RecommendationType::Related, 1)
        .await
        .expect("lookup");
    assert!(stored.is_none());
}

#[tokio::test]
async fn test_clear_cache_forces_recomputation() {
    let env = setup_test_env(
        default_products(),
        vec![(20, 0.1)],
        RecommendationConfig::default(),
    )
    .await;
    let shopper = ShopperContext::customer(7);

    env.service.related_products(10, None, 1, &shopper).await;
    env.service.clear_cache(10).await.expect("clear cache");
    let again = env.service.related_products(10, None, 1, &shopper).await;

    assert_eq!(ids(&again), vec![20]);
    assert_eq!(env.vectors.queries.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_clear_all_cache_drops_every_type() {
    let env = setup_test_env(
        default_products(),
        vec![(20, 0.1), (30, 0.2)],
        RecommendationConfig::default(),
    )
    .await;
    let shopper = ShopperContext::default();

    env.service.related_products(10, None, 1, &shopper).await;
    env.service.crosssell_products(10, None, 1, &shopper).await;

    let removed = env.service.clear_all_cache().await.expect("clear all");
    assert_eq!(removed, 2);
}

#[tokio::test]
async fn test_query_search_and_indexed_check() {
    let embedding = Arc::new(MockEmbedding::new());
    let vectors = Arc::new(InMemoryVectorRepository::new());
    let config = RecommendationConfig::default();
    let collection = vectors
        .get_or_create_collection(&config.general.collection_name, None)
        .await
        .expect("collection");

    let products = default_products();
    let mut documents = Vec::new();
    for product in &products {
        let mut metadata = Map::new();
        metadata.insert("product_id".into(), product.id.into());
        metadata.insert("store_id".into(), 1.into());
        documents.push(VectorDocument {
            id: DocumentId::format(product.id, 1),
            document: product.name.clone(),
            metadata,
            embedding: embedding.embed_one(&product.name).await,
        });
    }
    vectors.upsert(&collection, &documents).await.expect("upsert");

    let service = RecommendationService::new(
        catalog(products).await,
        embedding,
        vectors,
        Arc::new(InMemoryKeyValueCache::new()),
        Arc::new(DuckdbLlmRankingRepository::in_memory().expect("duckdb init")),
        Arc::new(StaticStoreDirectory::new(vec![1])),
        config,
    );

    let found = service
        .similar_products_by_query("Walnut standing desk", 2, 1)
        .await;
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].id, 20);

    assert!(service.similar_products_by_query("desk", 2, 9).await.is_empty());
    assert!(service.has_ai_recommendations(30, 1).await);
    assert!(!service.has_ai_recommendations(99, 1).await);
}
