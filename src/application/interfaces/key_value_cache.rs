use std::time::Duration;

use async_trait::async_trait;

use crate::domain::DomainError;

/// Shared key-value cache with TTL and tag-based bulk invalidation.
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<String>, DomainError>;

    async fn save(
        &self,
        key: &str,
        value: &str,
        tags: &[&str],
        ttl: Option<Duration>,
    ) -> Result<(), DomainError>;

    async fn remove(&self, key: &str) -> Result<(), DomainError>;

    /// Remove every entry carrying `tag`, returning how many were dropped.
    async fn clean_tag(&self, tag: &str) -> Result<usize, DomainError>;

    /// Atomically add one to a counter and restart its TTL.
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, DomainError>;
}
