pub mod application;
pub mod cli;
pub mod connector;
pub mod domain;

pub use application::{
    EmbeddingService, KeyValueCache, LlmProvider, LlmRankingRepository,
    PersonalizedRecommendationService, ProductCatalog, RecommendationConfig,
    RecommendationService, VectorRepository,
};

pub use cli::Commands;

pub use connector::{
    ChromaVectorRepository, Container, ContainerConfig, DuckdbProductCatalog, HttpEmbedding,
    InMemoryVectorRepository, MockEmbedding, Router,
};

pub use domain::{
    CustomerProfile, DomainError, EmbeddingConfig, LlmRanking, Product, ProfileType,
    RecommendationResult, RecommendationType, ShopperContext,
};
