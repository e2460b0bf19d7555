mod cache_key;
mod cached_recommendation;
mod customer_profile;
mod document_id;
mod embedding;
mod llm_ranking;
mod product;
mod recommendation;
mod shopper;
mod time;
mod trending;
mod where_filter;

pub use cache_key::*;
pub use cached_recommendation::*;
pub use customer_profile::*;
pub use document_id::*;
pub use embedding::*;
pub use llm_ranking::*;
pub use product::*;
pub use recommendation::*;
pub use shopper::*;
pub use time::*;
pub use trending::*;
pub use where_filter::*;
