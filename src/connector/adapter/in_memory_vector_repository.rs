use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::{CollectionHandle, VectorDocument, VectorMatch, VectorRepository};
use crate::domain::{cosine_similarity, DomainError, WhereFilter};

#[derive(Default)]
struct Collection {
    handle: Option<CollectionHandle>,
    documents: HashMap<String, VectorDocument>,
}

/// Brute-force cosine search over documents held in process memory.
///
/// Distance is reported as `1 - cosine`, so identical vectors sit at 0.
pub struct InMemoryVectorRepository {
    collections: Arc<Mutex<HashMap<String, Collection>>>,
}

impl InMemoryVectorRepository {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryVectorRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorRepository for InMemoryVectorRepository {
    async fn get_or_create_collection(
        &self,
        name: &str,
        _metadata: Option<Map<String, Value>>,
    ) -> Result<CollectionHandle, DomainError> {
        let mut collections = self.collections.lock().await;
        let collection = collections.entry(name.to_string()).or_default();
        let handle = collection
            .handle
            .get_or_insert_with(|| CollectionHandle {
                id: format!("mem-{}", name),
                name: name.to_string(),
            })
            .clone();
        Ok(handle)
    }

    async fn upsert(
        &self,
        collection: &CollectionHandle,
        documents: &[VectorDocument],
    ) -> Result<(), DomainError> {
        let mut collections = self.collections.lock().await;
        let store = collections
            .get_mut(&collection.name)
            .ok_or_else(|| DomainError::vector_store(format!("Unknown collection {}", collection.name)))?;

        for document in documents {
            store.documents.insert(document.id.clone(), document.clone());
        }

        debug!("Upserted {} documents into {}", documents.len(), collection.name);
        Ok(())
    }

    async fn delete(&self, collection: &CollectionHandle, ids: &[String]) -> Result<(), DomainError> {
        let mut collections = self.collections.lock().await;
        if let Some(store) = collections.get_mut(&collection.name) {
            for id in ids {
                store.documents.remove(id);
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &CollectionHandle,
        query_embeddings: &[Vec<f32>],
        n_results: usize,
        filter: Option<&WhereFilter>,
    ) -> Vec<Vec<VectorMatch>> {
        let collections = self.collections.lock().await;
        let Some(store) = collections.get(&collection.name) else {
            return query_embeddings.iter().map(|_| Vec::new()).collect();
        };

        query_embeddings
            .iter()
            .map(|query| {
                let mut scored: Vec<VectorMatch> = store
                    .documents
                    .values()
                    .filter(|doc| filter.map_or(true, |f| f.matches(&doc.metadata)))
                    .map(|doc| VectorMatch {
                        id: doc.id.clone(),
                        distance: Some(1.0 - cosine_similarity(query, &doc.embedding)),
                        metadata: doc.metadata.clone(),
                    })
                    .collect();

                scored.sort_by(|a, b| {
                    a.distance
                        .partial_cmp(&b.distance)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.id.cmp(&b.id))
                });
                scored.truncate(n_results);
                scored
            })
            .collect()
    }

    async fn get(&self, collection: &CollectionHandle, ids: &[String]) -> Vec<VectorMatch> {
        let collections = self.collections.lock().await;
        let Some(store) = collections.get(&collection.name) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| store.documents.get(id))
            .map(|doc| VectorMatch {
                id: doc.id.clone(),
                distance: None,
                metadata: doc.metadata.clone(),
            })
            .collect()
    }

    async fn count(&self, collection: &CollectionHandle) -> usize {
        let collections = self.collections.lock().await;
        collections
            .get(&collection.name)
            .map_or(0, |store| store.documents.len())
    }

    async fn heartbeat(&self) -> Result<(), DomainError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(id: &str, store_id: u32, embedding: Vec<f32>) -> VectorDocument {
        let mut metadata = Map::new();
        metadata.insert("store_id".into(), store_id.into());
        VectorDocument {
            id: id.to_string(),
            document: id.to_string(),
            metadata,
            embedding,
        }
    }

    #[tokio::test]
    async fn test_query_orders_by_distance_and_filters() {
        let repo = InMemoryVectorRepository::new();
        let collection = repo.get_or_create_collection("products", None).await.unwrap();
        repo.upsert(
            &collection,
            &[
                document("product_1_1", 1, vec![1.0, 0.0]),
                document("product_2_1", 1, vec![0.7, 0.7]),
                document("product_3_2", 2, vec![1.0, 0.0]),
            ],
        )
        .await
        .unwrap();

        let filter = WhereFilter::eq("store_id", 1);
        let matches = repo
            .query(&collection, &[vec![1.0, 0.0]], 10, Some(&filter))
            .await
            .remove(0);

        let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["product_1_1", "product_2_1"]);
        assert!(matches[0].distance.unwrap().abs() < 1e-6);
        assert_eq!(repo.count(&collection).await, 3);
    }

    #[tokio::test]
    async fn test_get_and_delete() {
        let repo = InMemoryVectorRepository::new();
        let collection = repo.get_or_create_collection("products", None).await.unwrap();
        repo.upsert(&collection, &[document("product_1_1", 1, vec![1.0])])
            .await
            .unwrap();

        let ids = vec!["product_1_1".to_string(), "product_9_1".to_string()];
        assert_eq!(repo.get(&collection, &ids).await.len(), 1);

        repo.delete(&collection, &ids).await.unwrap();
        assert!(repo.get(&collection, &ids).await.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_into_unknown_collection_fails() {
        let repo = InMemoryVectorRepository::new();
        let handle = CollectionHandle {
            id: "x".into(),
            name: "missing".into(),
        };
        assert!(repo.upsert(&handle, &[]).await.is_err());
    }
}
