mod circuit_breaker;
mod context_builder;
mod diversity_filter;
mod explainer;
mod llm_reranker;
mod personalized_recommendations;
mod product_text_builder;
mod profile_builder;
mod recommendation_service;
mod trending_booster;

pub use circuit_breaker::*;
pub use context_builder::*;
pub use diversity_filter::*;
pub use explainer::*;
pub use llm_reranker::*;
pub use personalized_recommendations::*;
pub use product_text_builder::*;
pub use profile_builder::*;
pub use recommendation_service::*;
pub use trending_booster::*;
