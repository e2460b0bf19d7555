mod behavior_collector;
mod embedding_service;
mod key_value_cache;
mod llm_provider;
mod llm_ranking_repository;
mod product_catalog;
mod profile_repository;
mod recommendation_cache_repository;
mod trending_repository;
mod vector_repository;

pub use behavior_collector::*;
pub use embedding_service::*;
pub use key_value_cache::*;
pub use llm_provider::*;
pub use llm_ranking_repository::*;
pub use product_catalog::*;
pub use profile_repository::*;
pub use recommendation_cache_repository::*;
pub use trending_repository::*;
pub use vector_repository::*;
