use crate::core::cache::CacheStore;
use crate::core::currency::{PairKey, RateEntry};
use crate::core::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

struct CacheValue {
    entry: RateEntry,
    /// `None` when the TTL reaches past what `Instant` can represent
    expires_at: Option<Instant>,
}

impl CacheValue {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-memory rate store using a HashMap behind a Mutex
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<HashMap<PairKey, CacheValue>>>,
}

impl MemoryStore {
    /// Creates a new MemoryStore instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes expired entries, returning how many were dropped.
    pub async fn sweep(&self) -> usize {
        let mut cache = self.inner.lock().await;
        let before = cache.len();
        let now = Instant::now();
        cache.retain(|_, value| !value.is_expired(now));
        before - cache.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Spawns a task that sweeps expired entries every `interval`. The task
    /// holds only a weak reference and stops once the store is dropped.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            debug!("Starting memory cache sweeper every {:?}", interval);
            loop {
                tokio::time::sleep(interval).await;
                let Some(inner) = weak.upgrade() else {
                    debug!("Memory cache dropped, stopping sweeper");
                    break;
                };
                let removed = MemoryStore { inner }.sweep().await;
                if removed > 0 {
                    debug!("Memory cache sweep removed {} expired entries", removed);
                }
            }
        })
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &PairKey) -> Result<Option<RateEntry>, StoreError> {
        let mut cache = self.inner.lock().await;
        if let Some(value) = cache.get(key) {
            if value.is_expired(Instant::now()) {
                debug!("Cache entry expired for key: {}", key);
                cache.remove(key);
                return Ok(None);
            }
            debug!("Cache HIT for key: {}", key);
            return Ok(Some(value.entry.clone()));
        }
        debug!("Cache MISS for key: {}", key);
        Ok(None)
    }

    async fn put(&self, key: &PairKey, entry: &RateEntry, ttl: Duration) -> Result<(), StoreError> {
        let value = CacheValue {
            entry: entry.clone(),
            expires_at: Instant::now().checked_add(ttl),
        };

        let mut cache = self.inner.lock().await;
        debug!("Cache PUT for key: {}", key);
        cache.insert(key.clone(), value);
        Ok(())
    }

    async fn delete(&self, key: &PairKey) -> Result<(), StoreError> {
        let mut cache = self.inner.lock().await;
        cache.remove(key);
        debug!("Cache REMOVE for key: {}", key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut cache = self.inner.lock().await;
        cache.clear();
        debug!("Cache CLEAR");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tokio::time::sleep;

    fn entry(base: &str, quote: &str, rate: &str) -> RateEntry {
        RateEntry {
            base: base.parse().unwrap(),
            quote: quote.parse().unwrap(),
            rate: rate.parse().unwrap(),
            fetched_at: Utc::now(),
        }
    }

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_cache_get_put() {
        let cache = MemoryStore::new();
        let usd_eur = entry("USD", "EUR", "0.92");

        // Initially, cache is empty
        assert!(cache.get(&usd_eur.key()).await.unwrap().is_none());

        cache.put(&usd_eur.key(), &usd_eur, HOUR).await.unwrap();
        assert_eq!(cache.get(&usd_eur.key()).await.unwrap(), Some(usd_eur.clone()));

        // The reverse pair is a different key
        let eur_usd = entry("EUR", "USD", "1.08");
        assert!(cache.get(&eur_usd.key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let cache = MemoryStore::new();
        let old = entry("USD", "EUR", "0.92");
        let new = entry("USD", "EUR", "0.93");

        cache.put(&old.key(), &old, HOUR).await.unwrap();
        cache.put(&new.key(), &new, HOUR).await.unwrap();
        assert_eq!(cache.get(&old.key()).await.unwrap(), Some(new));
    }

    #[tokio::test]
    async fn test_cache_ttl_expiration() {
        let cache = MemoryStore::new();
        let usd_eur = entry("USD", "EUR", "0.92");

        cache
            .put(&usd_eur.key(), &usd_eur, Duration::from_millis(10))
            .await
            .unwrap();
        assert!(cache.get(&usd_eur.key()).await.unwrap().is_some());

        // Wait for TTL expiration
        sleep(Duration::from_millis(20)).await;
        assert!(cache.get(&usd_eur.key()).await.unwrap().is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_cache_delete_and_clear() {
        let cache = MemoryStore::new();
        let usd_eur = entry("USD", "EUR", "0.92");
        let usd_gbp = entry("USD", "GBP", "0.79");

        cache.put(&usd_eur.key(), &usd_eur, HOUR).await.unwrap();
        cache.put(&usd_gbp.key(), &usd_gbp, HOUR).await.unwrap();

        cache.delete(&usd_eur.key()).await.unwrap();
        assert!(cache.get(&usd_eur.key()).await.unwrap().is_none());
        // Deleting again is a no-op
        cache.delete(&usd_eur.key()).await.unwrap();

        cache.clear().await.unwrap();
        assert!(cache.get(&usd_gbp.key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_huge_ttl_does_not_overflow() {
        let cache = MemoryStore::new();
        let usd_eur = entry("USD", "EUR", "0.92");

        cache
            .put(&usd_eur.key(), &usd_eur, Duration::from_secs(u64::MAX))
            .await
            .unwrap();
        assert_eq!(cache.get(&usd_eur.key()).await.unwrap(), Some(usd_eur));
        assert_eq!(cache.sweep().await, 0);
    }

    #[tokio::test]
    async fn test_sweeper_removes_expired_entries() {
        let cache = MemoryStore::new();
        let short = entry("USD", "EUR", "0.92");
        let long = entry("USD", "GBP", "0.79");
        cache
            .put(&short.key(), &short, Duration::from_millis(10))
            .await
            .unwrap();
        cache.put(&long.key(), &long, HOUR).await.unwrap();

        let handle = cache.spawn_sweeper(Duration::from_millis(20));
        sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.len().await, 1);

        drop(cache);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should stop once the store is gone")
            .unwrap();
    }
}
