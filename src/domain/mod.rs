//! # Domain Layer
//!
//! Products, recommendation results, profiles and the cache/ranking records
//! that flow between the orchestrators. This layer performs no I/O.

mod error;
pub mod models;

pub use error::*;
pub use models::*;
