use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use crate::application::{
    BehaviorCollectors, CircuitBreaker, EmbeddingService, KeyValueCache, LlmConfig, LlmProvider,
    LlmRankingRepository, LlmReRanker, PersonalizedRecommendationService, ProductTextBuilder,
    ProfileBuilder, RecommendationConfig, RecommendationService, StoreDirectory, TrendingBooster,
    VectorRepository,
};
use crate::connector::adapter::{
    AnthropicClient, BrowsingHistoryCollector, ChromaVectorRepository, DuckdbCommerceStore,
    DuckdbKeyValueCache, DuckdbLlmRankingRepository, DuckdbProductCatalog, DuckdbProfileRepository,
    DuckdbRecommendationCacheRepository, DuckdbTrendingRepository, HttpEmbedding,
    InMemoryKeyValueCache, InMemoryVectorRepository, MockEmbedding, OpenAiClient,
    PurchaseHistoryCollector, WishlistCollector, DEFAULT_BASE_URL, DEFAULT_MODEL,
    DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL,
};
use crate::domain::EmbeddingConfig;

pub struct ContainerConfig {
    pub data_dir: String,
    pub mock_embeddings: bool,
    pub chroma_url: Option<String>,
    pub embedding_url: Option<String>,
    /// Keep every table and vector in memory; nothing touches `data_dir`.
    pub memory_storage: bool,
    pub recommendation: RecommendationConfig,
}

pub struct Container {
    catalog: Arc<DuckdbProductCatalog>,
    commerce: Arc<DuckdbCommerceStore>,
    browsing: Arc<BrowsingHistoryCollector>,
    embedding_service: Arc<dyn EmbeddingService>,
    vector_repo: Arc<dyn VectorRepository>,
    llm_provider: Option<Arc<dyn LlmProvider>>,
    cache: Arc<dyn KeyValueCache>,
    rankings: Arc<dyn LlmRankingRepository>,
    trending: Arc<TrendingBooster>,
    recommendation_service: Arc<RecommendationService>,
    personalized_service: Arc<PersonalizedRecommendationService>,
    config: ContainerConfig,
}

impl Container {
    pub async fn new(config: ContainerConfig) -> Result<Self> {
        let settings = config.recommendation.clone();

        // One DuckDB connection is shared by every table-backed adapter
        // (DuckDB only allows one write connection per file)
        let catalog = if config.memory_storage {
            debug!("Using in-memory DuckDB storage");
            Arc::new(DuckdbProductCatalog::in_memory()?)
        } else {
            let db_path = PathBuf::from(&config.data_dir).join("shoprec.duckdb");
            debug!("Using DuckDB storage at {:?}", db_path);
            Arc::new(DuckdbProductCatalog::new(&db_path)?)
        };
        let shared_conn = catalog.shared_connection();

        let commerce = Arc::new(DuckdbCommerceStore::with_connection(Arc::clone(&shared_conn)).await?);
        let profiles = Arc::new(DuckdbProfileRepository::with_connection(Arc::clone(&shared_conn)).await?);
        let rankings: Arc<dyn LlmRankingRepository> =
            Arc::new(DuckdbLlmRankingRepository::with_connection(Arc::clone(&shared_conn)).await?);
        let results = Arc::new(
            DuckdbRecommendationCacheRepository::with_connection(Arc::clone(&shared_conn)).await?,
        );
        let trending_repo =
            Arc::new(DuckdbTrendingRepository::with_connection(Arc::clone(&shared_conn)).await?);
        let browsing =
            Arc::new(BrowsingHistoryCollector::with_connection(Arc::clone(&shared_conn)).await?);
        let purchase =
            Arc::new(PurchaseHistoryCollector::with_connection(Arc::clone(&shared_conn)).await?);
        let wishlist = Arc::new(WishlistCollector::with_connection(Arc::clone(&shared_conn)).await?);

        let cache: Arc<dyn KeyValueCache> = if config.memory_storage {
            Arc::new(InMemoryKeyValueCache::new())
        } else {
            Arc::new(DuckdbKeyValueCache::with_connection(Arc::clone(&shared_conn)).await?)
        };

        let embedding_service: Arc<dyn EmbeddingService> = if config.mock_embeddings {
            debug!("Using mock embedding service");
            Arc::new(MockEmbedding::new())
        } else if let Some(url) = config.embedding_url.as_deref() {
            debug!("Using embedding service at {}", url);
            Arc::new(HttpEmbedding::new(url, EmbeddingConfig::default()))
        } else {
            Arc::new(HttpEmbedding::from_env(EmbeddingConfig::default()))
        };

        let vector_repo: Arc<dyn VectorRepository> = if config.memory_storage {
            debug!("Using in-memory vector storage");
            Arc::new(InMemoryVectorRepository::new())
        } else {
            let chroma = match config.chroma_url.as_deref() {
                Some(url) => ChromaVectorRepository::new(url),
                None => ChromaVectorRepository::from_env(),
            };
            if let Err(e) = chroma.heartbeat().await {
                warn!(
                    "Vector store is not reachable ({}). Recommendations will be empty until it is.",
                    e
                );
            }
            Arc::new(chroma)
        };

        let llm_provider = build_llm_provider(&settings.llm);
        let breaker = Arc::new(CircuitBreaker::new(Arc::clone(&cache)));
        let reranker = Arc::new(LlmReRanker::new(
            llm_provider.clone(),
            breaker,
            settings.llm.clone(),
        ));
        let trending = Arc::new(
            TrendingBooster::new(trending_repo).with_period(settings.ranking.trending_period_days),
        );

        let stores: Arc<dyn StoreDirectory> = catalog.clone();
        let recommendation_service = Arc::new(
            RecommendationService::new(
                catalog.clone(),
                Arc::clone(&embedding_service),
                Arc::clone(&vector_repo),
                Arc::clone(&cache),
                Arc::clone(&rankings),
                stores,
                settings.clone(),
            )
            .with_reranker(reranker)
            .with_trending(Arc::clone(&trending)),
        );

        let builder = ProfileBuilder::new(
            catalog.clone(),
            Arc::clone(&embedding_service),
            profiles.clone(),
            ProductTextBuilder::new(&settings.text),
        )
        .with_weights(settings.personalization.weights());
        let collectors = BehaviorCollectors {
            browsing: browsing.clone(),
            purchase,
            wishlist,
        };
        let personalized_service = Arc::new(PersonalizedRecommendationService::new(
            catalog.clone(),
            Arc::clone(&vector_repo),
            results,
            profiles,
            builder,
            collectors,
            settings,
        ));

        Ok(Self {
            catalog,
            commerce,
            browsing,
            embedding_service,
            vector_repo,
            llm_provider,
            cache,
            rankings,
            trending,
            recommendation_service,
            personalized_service,
            config,
        })
    }

    pub fn recommendation_service(&self) -> Arc<RecommendationService> {
        self.recommendation_service.clone()
    }

    pub fn personalized_service(&self) -> Arc<PersonalizedRecommendationService> {
        self.personalized_service.clone()
    }

    pub fn trending_booster(&self) -> Arc<TrendingBooster> {
        self.trending.clone()
    }

    pub fn catalog(&self) -> Arc<DuckdbProductCatalog> {
        self.catalog.clone()
    }

    pub fn commerce_store(&self) -> Arc<DuckdbCommerceStore> {
        self.commerce.clone()
    }

    pub fn browsing_collector(&self) -> Arc<BrowsingHistoryCollector> {
        self.browsing.clone()
    }

    pub fn embedding_service(&self) -> Arc<dyn EmbeddingService> {
        self.embedding_service.clone()
    }

    pub fn vector_repo(&self) -> Arc<dyn VectorRepository> {
        self.vector_repo.clone()
    }

    pub fn llm_provider(&self) -> Option<Arc<dyn LlmProvider>> {
        self.llm_provider.clone()
    }

    pub fn cache(&self) -> Arc<dyn KeyValueCache> {
        self.cache.clone()
    }

    pub fn rankings(&self) -> Arc<dyn LlmRankingRepository> {
        self.rankings.clone()
    }

    pub fn settings(&self) -> &RecommendationConfig {
        &self.config.recommendation
    }

    pub fn data_dir(&self) -> &str {
        &self.config.data_dir
    }

    pub fn memory_storage(&self) -> bool {
        self.config.memory_storage
    }
}

/// Provider named by `llm.provider`; `None` when re-ranking is off or the
/// provider is unknown.
fn build_llm_provider(config: &LlmConfig) -> Option<Arc<dyn LlmProvider>> {
    if !config.enabled {
        return None;
    }
    let api_key = config.api_key.clone().unwrap_or_default();
    match config.provider.as_str() {
        "claude" | "anthropic" => {
            let base = std::env::var("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
            let model = config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string());
            debug!("Using Anthropic provider with model {}", model);
            let provider: Arc<dyn LlmProvider> = Arc::new(AnthropicClient::new(api_key, model, base));
            Some(provider)
        }
        "openai" => {
            let base = std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_OPENAI_BASE_URL.to_string());
            let model = config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
            debug!("Using OpenAI provider with model {}", model);
            let provider: Arc<dyn LlmProvider> = Arc::new(OpenAiClient::new(api_key, model, base));
            Some(provider)
        }
        other => {
            warn!("Unknown LLM provider '{}'. Continuing without re-ranking.", other);
            None
        }
    }
}
