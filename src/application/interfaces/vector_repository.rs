use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::domain::{DomainError, WhereFilter};

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionHandle {
    pub id: String,
    pub name: String,
}

/// A document written to the vector store, always with a precomputed embedding.
#[derive(Debug, Clone)]
pub struct VectorDocument {
    pub id: String,
    pub document: String,
    pub metadata: Map<String, Value>,
    pub embedding: Vec<f32>,
}

/// One nearest-neighbor hit. `distance` is absent for plain gets.
#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub id: String,
    pub distance: Option<f32>,
    pub metadata: Map<String, Value>,
}

/// Document/vector collection storage.
///
/// Writes raise on failure; reads degrade to empty results.
#[async_trait]
pub trait VectorRepository: Send + Sync {
    async fn get_or_create_collection(
        &self,
        name: &str,
        metadata: Option<Map<String, Value>>,
    ) -> Result<CollectionHandle, DomainError>;

    async fn upsert(
        &self,
        collection: &CollectionHandle,
        documents: &[VectorDocument],
    ) -> Result<(), DomainError>;

    async fn delete(&self, collection: &CollectionHandle, ids: &[String]) -> Result<(), DomainError>;

    /// Nearest neighbors for each query embedding, best first.
    async fn query(
        &self,
        collection: &CollectionHandle,
        query_embeddings: &[Vec<f32>],
        n_results: usize,
        filter: Option<&WhereFilter>,
    ) -> Vec<Vec<VectorMatch>>;

    async fn get(&self, collection: &CollectionHandle, ids: &[String]) -> Vec<VectorMatch>;

    async fn count(&self, collection: &CollectionHandle) -> usize;

    async fn heartbeat(&self) -> Result<(), DomainError>;
}
