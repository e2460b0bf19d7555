//! # Connector Layer
//!
//! External integrations implementing the application interfaces:
//! - Vector stores (Chroma over HTTP, in-memory)
//! - Embedding and LLM providers (HTTP clients, deterministic mock)
//! - DuckDB tables for profiles, rankings, caches, trending and behavior
//! - The dependency container and CLI routing

pub mod adapter;
pub mod api;

pub use adapter::*;
pub use api::*;
