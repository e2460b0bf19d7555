use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use super::ProductTextBuilder;
use crate::application::{
    EmbeddingService, ProductCatalog, ProductQuery, ProfileRepository, ProfileWeights,
};
use crate::domain::{average_vectors, weighted_average, CustomerProfile, ProfileType};

/// Signal product ids feeding one profile.
#[derive(Debug, Clone, Copy)]
pub enum ProfileSignals<'a> {
    Single(&'a [i64]),
    Combined {
        wishlist: &'a [i64],
        purchase: &'a [i64],
        browsing: &'a [i64],
    },
}

impl ProfileSignals<'_> {
    /// Every source id, deduplicated, in wishlist/purchase/browsing order.
    pub fn source_ids(&self) -> Vec<i64> {
        let lists: Vec<&[i64]> = match self {
            Self::Single(ids) => vec![ids],
            Self::Combined {
                wishlist,
                purchase,
                browsing,
            } => vec![wishlist, purchase, browsing],
        };
        let mut seen = HashSet::new();
        lists
            .into_iter()
            .flatten()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

/// Averages product embeddings into profile vectors and keeps persisted
/// profiles fresh.
pub struct ProfileBuilder {
    catalog: Arc<dyn ProductCatalog>,
    embedding: Arc<dyn EmbeddingService>,
    profiles: Arc<dyn ProfileRepository>,
    text_builder: ProductTextBuilder,
    weights: ProfileWeights,
}

impl ProfileBuilder {
    pub fn new(
        catalog: Arc<dyn ProductCatalog>,
        embedding: Arc<dyn EmbeddingService>,
        profiles: Arc<dyn ProfileRepository>,
        text_builder: ProductTextBuilder,
    ) -> Self {
        Self {
            catalog,
            embedding,
            profiles,
            text_builder,
            weights: ProfileWeights::default(),
        }
    }

    pub fn with_weights(mut self, weights: ProfileWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Unweighted mean of the embeddings of `product_ids`; empty when no
    /// product yields an embedding.
    pub async fn build_profile(&self, product_ids: &[i64], store_id: u32) -> Vec<f32> {
        if product_ids.is_empty() {
            return Vec::new();
        }

        let products = match self
            .catalog
            .query(&ProductQuery::by_ids(product_ids.to_vec(), store_id))
            .await
        {
            Ok(products) => products,
            Err(e) => {
                warn!("Failed to load products for profile: {}", e);
                return Vec::new();
            }
        };

        let mut vectors = Vec::with_capacity(products.len());
        for product in &products {
            let text = self.text_builder.build(product);
            if text.is_empty() {
                continue;
            }
            let vector = self.embedding.embed_one(&text).await;
            if vector.is_empty() {
                debug!("No embedding for product {}, skipping", product.id);
                continue;
            }
            vectors.push(vector);
        }

        debug!(
            requested = product_ids.len(),
            embedded = vectors.len(),
            "Built profile embedding"
        );
        average_vectors(&vectors)
    }

    /// Weighted blend of per-signal profiles; absent signals drop out of
    /// both numerator and denominator.
    pub async fn build_combined_profile(
        &self,
        wishlist_ids: &[i64],
        purchase_ids: &[i64],
        browsing_ids: &[i64],
        store_id: u32,
    ) -> Vec<f32> {
        let wishlist = self.build_profile(wishlist_ids, store_id).await;
        let purchase = self.build_profile(purchase_ids, store_id).await;
        let browsing = self.build_profile(browsing_ids, store_id).await;

        weighted_average(&[
            (self.weights.wishlist, wishlist.as_slice()),
            (self.weights.purchase, purchase.as_slice()),
            (self.weights.browsing, browsing.as_slice()),
        ])
    }

    /// Reuse the stored profile when it still covers more than 70% of the
    /// current signals, otherwise rebuild and persist. Guests always get a
    /// fresh, unsaved profile.
    pub async fn resolve(
        &self,
        customer_id: Option<i64>,
        profile_type: ProfileType,
        signals: ProfileSignals<'_>,
        store_id: u32,
    ) -> Vec<f32> {
        let source_ids = signals.source_ids();

        if let Some(customer_id) = customer_id {
            match self.profiles.find(customer_id, profile_type, store_id).await {
                Ok(Some(existing)) if existing.is_reusable_for(&source_ids) => {
                    debug!(customer_id, %profile_type, "Reusing stored profile");
                    return existing.embedding;
                }
                Ok(_) => {}
                Err(e) => warn!("Failed to load profile for customer {}: {}", customer_id, e),
            }
        }

        let embedding = match signals {
            ProfileSignals::Single(ids) => self.build_profile(ids, store_id).await,
            ProfileSignals::Combined {
                wishlist,
                purchase,
                browsing,
            } => {
                self.build_combined_profile(wishlist, purchase, browsing, store_id)
                    .await
            }
        };

        if let Some(customer_id) = customer_id {
            if !embedding.is_empty() {
                let profile = CustomerProfile::new(
                    customer_id,
                    profile_type,
                    embedding.clone(),
                    &source_ids,
                    store_id,
                );
                if let Err(e) = self.profiles.save(&profile).await {
                    warn!("Failed to save profile for customer {}: {}", customer_id, e);
                }
            }
        }

        embedding
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::connector::adapter::{DuckdbProfileRepository, InMemoryProductCatalog, MockEmbedding};
    use crate::domain::{DomainError, EmbeddingConfig, Product};

    struct CountingEmbedding {
        inner: MockEmbedding,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingService for CountingEmbedding {
        async fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(texts).await
        }

        async fn health_check(&self) -> Result<(), DomainError> {
            Ok(())
        }

        fn config(&self) -> &EmbeddingConfig {
            self.inner.config()
        }
    }

    async fn fixture() -> (ProfileBuilder, Arc<CountingEmbedding>, Arc<DuckdbProfileRepository>) {
        let catalog = InMemoryProductCatalog::new();
        for id in 1..=15 {
            catalog
                .insert(Product::new(id, format!("SKU-{id}"), format!("Product {id}"), 10.0))
                .await;
        }
        let embedding = Arc::new(CountingEmbedding {
            inner: MockEmbedding::with_dimensions(8),
            calls: AtomicUsize::new(0),
        });
        let profiles = Arc::new(DuckdbProfileRepository::in_memory().unwrap());
        let builder = ProfileBuilder::new(
            Arc::new(catalog),
            embedding.clone(),
            profiles.clone(),
            ProductTextBuilder::default(),
        );
        (builder, embedding, profiles)
    }

    #[tokio::test]
    async fn test_profile_is_mean_of_product_embeddings() {
        let (builder, _, _) = fixture().await;
        let mock = MockEmbedding::with_dimensions(8);
        let a = mock.embed_one("Product 1").await;
        let b = mock.embed_one("Product 2").await;

        let profile = builder.build_profile(&[1, 2], 1).await;
        for k in 0..8 {
            assert!((profile[k] - (a[k] + b[k]) / 2.0).abs() < 1e-6);
        }
        assert!(builder.build_profile(&[], 1).await.is_empty());
        assert!(builder.build_profile(&[999], 1).await.is_empty());
    }

    #[tokio::test]
    async fn test_stored_profile_reused_above_overlap() {
        let (builder, embedding, profiles) = fixture().await;
        let first: Vec<i64> = (1..=10).collect();
        let stored = builder
            .resolve(Some(5), ProfileType::Browsing, ProfileSignals::Single(&first), 1)
            .await;
        let calls_after_first = embedding.calls.load(Ordering::SeqCst);

        // 8 of 10 current ids were seen before
        let second: Vec<i64> = (1..=8).chain([11, 12]).collect();
        let reused = builder
            .resolve(Some(5), ProfileType::Browsing, ProfileSignals::Single(&second), 1)
            .await;

        assert_eq!(stored, reused);
        assert_eq!(embedding.calls.load(Ordering::SeqCst), calls_after_first);
        let saved = profiles.find(5, ProfileType::Browsing, 1).await.unwrap().unwrap();
        assert_eq!(saved.source_product_ids, first);
    }

    #[tokio::test]
    async fn test_stored_profile_replaced_at_or_below_overlap() {
        let (builder, embedding, profiles) = fixture().await;
        let first: Vec<i64> = (1..=10).collect();
        let stored = builder
            .resolve(Some(5), ProfileType::Browsing, ProfileSignals::Single(&first), 1)
            .await;
        let calls_after_first = embedding.calls.load(Ordering::SeqCst);

        // exactly 7 of 10 overlap
        let second: Vec<i64> = (1..=7).chain([11, 12, 13]).collect();
        let refreshed = builder
            .resolve(Some(5), ProfileType::Browsing, ProfileSignals::Single(&second), 1)
            .await;

        assert_ne!(stored, refreshed);
        assert!(embedding.calls.load(Ordering::SeqCst) > calls_after_first);
        let saved = profiles.find(5, ProfileType::Browsing, 1).await.unwrap().unwrap();
        assert_eq!(saved.embedding, refreshed);
    }

    #[tokio::test]
    async fn test_guest_profiles_are_not_persisted() {
        let (builder, _, profiles) = fixture().await;
        let ids = [1, 2, 3];
        let profile = builder
            .resolve(None, ProfileType::Browsing, ProfileSignals::Single(&ids), 1)
            .await;
        assert!(!profile.is_empty());
        assert!(profiles.find_stale(i64::MAX, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_combined_profile_weights_present_signals() {
        let (builder, _, _) = fixture().await;
        let wishlist = builder.build_profile(&[1], 1).await;
        let purchase = builder.build_profile(&[2, 3], 1).await;

        let combined = builder.build_combined_profile(&[1], &[2, 3], &[], 1).await;
        for k in 0..8 {
            let expected = (0.40 * wishlist[k] + 0.35 * purchase[k]) / 0.75;
            assert!((combined[k] - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn test_combined_source_ids_are_deduplicated() {
        let signals = ProfileSignals::Combined {
            wishlist: &[3, 1],
            purchase: &[1, 2],
            browsing: &[4, 3],
        };
        assert_eq!(signals.source_ids(), vec![3, 1, 2, 4]);
    }
}
