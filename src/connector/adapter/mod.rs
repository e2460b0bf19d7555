mod anthropic_client;
mod chroma_vector_repository;
mod duckdb_behavior_collectors;
mod duckdb_commerce_store;
mod duckdb_key_value_cache;
mod duckdb_llm_ranking_repository;
mod duckdb_product_catalog;
mod duckdb_profile_repository;
mod duckdb_recommendation_cache_repository;
mod duckdb_trending_repository;
mod http_embedding;
mod in_memory_key_value_cache;
mod in_memory_product_catalog;
mod in_memory_vector_repository;
mod mock_embedding;
mod openai_client;

pub use anthropic_client::*;
pub use chroma_vector_repository::*;
pub use duckdb_behavior_collectors::*;
pub use duckdb_commerce_store::{DuckdbCommerceStore, OrderLine};
pub use duckdb_key_value_cache::*;
pub use duckdb_llm_ranking_repository::*;
pub use duckdb_product_catalog::*;
pub use duckdb_profile_repository::*;
pub use duckdb_recommendation_cache_repository::*;
pub use duckdb_trending_repository::*;
pub use http_embedding::*;
pub use in_memory_key_value_cache::*;
pub use in_memory_product_catalog::*;
pub use in_memory_vector_repository::*;
pub use mock_embedding::*;
pub use openai_client::*;
