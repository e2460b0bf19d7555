use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::application::KeyValueCache;
use crate::domain::DomainError;

struct Entry {
    value: String,
    tags: Vec<String>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Process-local cache backend. Expired entries are dropped lazily on access.
pub struct InMemoryKeyValueCache {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl InMemoryKeyValueCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryKeyValueCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueCache for InMemoryKeyValueCache {
    async fn load(&self, key: &str) -> Result<Option<String>, DomainError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn save(
        &self,
        key: &str,
        value: &str,
        tags: &[&str],
        ttl: Option<Duration>,
    ) -> Result<(), DomainError> {
        let entry = Entry {
            value: value.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.lock().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), DomainError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn clean_tag(&self, tag: &str) -> Result<usize, DomainError> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.tags.iter().any(|t| t == tag));
        Ok(before - entries.len())
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, DomainError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let current = entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .and_then(|entry| entry.value.parse::<u64>().ok())
            .unwrap_or(0);
        let next = current + 1;
        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                tags: Vec::new(),
                expires_at: Some(now + ttl),
            },
        );
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = InMemoryKeyValueCache::new();
        cache
            .save("k", "v", &[], Some(Duration::from_millis(20)))
            .await
            .unwrap();
        assert_eq!(cache.load("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cache.load("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clean_tag_only_drops_tagged() {
        let cache = InMemoryKeyValueCache::new();
        cache.save("a", "1", &["recs"], None).await.unwrap();
        cache.save("b", "2", &["recs", "other"], None).await.unwrap();
        cache.save("c", "3", &["other"], None).await.unwrap();

        assert_eq!(cache.clean_tag("recs").await.unwrap(), 2);
        assert!(cache.load("a").await.unwrap().is_none());
        assert_eq!(cache.load("c").await.unwrap().as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_increment_restarts_after_expiry() {
        let cache = InMemoryKeyValueCache::new();
        let ttl = Duration::from_millis(20);
        assert_eq!(cache.increment("n", ttl).await.unwrap(), 1);
        assert_eq!(cache.increment("n", ttl).await.unwrap(), 2);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.increment("n", ttl).await.unwrap(), 1);
    }
}
