use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};

use crate::application::KeyValueCache;
use crate::domain::CacheKey;

pub const FAILURE_THRESHOLD: u64 = 5;
pub const COOL_DOWN: Duration = Duration::from_secs(300);

/// Counting breaker over the shared cache.
///
/// Each failure bumps a counter whose TTL restarts on every bump; the circuit
/// is open while the counter is at or above the threshold and closes again
/// once the counter expires or a success resets it.
pub struct CircuitBreaker {
    cache: Arc<dyn KeyValueCache>,
    threshold: u64,
    cool_down: Duration,
}

impl CircuitBreaker {
    pub fn new(cache: Arc<dyn KeyValueCache>) -> Self {
        Self {
            cache,
            threshold: FAILURE_THRESHOLD,
            cool_down: COOL_DOWN,
        }
    }

    pub fn with_policy(mut self, threshold: u64, cool_down: Duration) -> Self {
        self.threshold = threshold;
        self.cool_down = cool_down;
        self
    }

    pub async fn failure_count(&self, service: &str) -> u64 {
        match self.cache.load(&CacheKey::circuit_breaker(service)).await {
            Ok(Some(raw)) => raw.trim().parse().unwrap_or(0),
            Ok(None) => 0,
            Err(e) => {
                warn!("Circuit breaker state for {} unreadable: {}", service, e);
                0
            }
        }
    }

    pub async fn is_open(&self, service: &str) -> bool {
        let failures = self.failure_count(service).await;
        let open = failures >= self.threshold;
        if open {
            warn!(service, failures, "Circuit breaker is open, skipping call");
        }
        open
    }

    pub async fn record_failure(&self, service: &str) -> u64 {
        let key = CacheKey::circuit_breaker(service);
        match self.cache.increment(&key, self.cool_down).await {
            Ok(failures) => {
                if failures == self.threshold {
                    error!(
                        service,
                        failures,
                        cool_down_secs = self.cool_down.as_secs(),
                        "Circuit breaker opened"
                    );
                }
                failures
            }
            Err(e) => {
                warn!("Failed to record failure for {}: {}", service, e);
                0
            }
        }
    }

    pub async fn reset(&self, service: &str) {
        if let Err(e) = self.cache.remove(&CacheKey::circuit_breaker(service)).await {
            warn!("Failed to reset circuit breaker for {}: {}", service, e);
        }
    }
}
