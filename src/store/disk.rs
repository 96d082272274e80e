use crate::core::cache::CacheStore;
use crate::core::currency::{PairKey, RateEntry};
use crate::core::error::StoreError;
use crate::store::StoredRate;
use async_trait::async_trait;
use chrono::Utc;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const PARTITION: &str = "rates";

/// Rate store persisted in a fjall keyspace, one JSON record per pair.
pub struct DiskStore {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl DiskStore {
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let keyspace = Config::new(db_path).open()?;
        let partition = keyspace.open_partition(PARTITION, PartitionCreateOptions::default())?;
        debug!("Opened disk cache at {}", db_path.display());
        Ok(Self {
            keyspace,
            partition,
        })
    }
}

#[async_trait]
impl CacheStore for DiskStore {
    fn name(&self) -> &'static str {
        "disk"
    }

    async fn get(&self, key: &PairKey) -> Result<Option<RateEntry>, StoreError> {
        let key = key.to_string();
        let Some(value) = self.partition.get(&key)? else {
            debug!("Cache MISS for key: {}", key);
            return Ok(None);
        };

        let record: StoredRate = serde_json::from_slice(&value)?;
        if record.is_expired(Utc::now()) {
            debug!("Cache entry expired for key: {}", key);
            self.partition.remove(key.as_str())?;
            return Ok(None);
        }
        debug!("Cache HIT for key: {}", key);
        Ok(Some(record.into_entry()))
    }

    async fn put(&self, key: &PairKey, entry: &RateEntry, ttl: Duration) -> Result<(), StoreError> {
        let record = StoredRate::new(key, entry, ttl);
        self.partition
            .insert(key.to_string(), serde_json::to_vec(&record)?)?;
        debug!("Cache PUT for key: {}", key);
        Ok(())
    }

    async fn delete(&self, key: &PairKey) -> Result<(), StoreError> {
        self.partition.remove(key.to_string())?;
        debug!("Cache REMOVE for key: {}", key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let keys = self
            .partition
            .keys()
            .collect::<Result<Vec<_>, _>>()?;
        for key in &keys {
            self.partition.remove(key.clone())?;
        }
        debug!("Cache CLEAR removed {} entries", keys.len());
        self.flush().await
    }

    async fn flush(&self) -> Result<(), StoreError> {
        let keyspace = self.keyspace.clone();
        tokio::task::spawn_blocking(move || keyspace.persist(PersistMode::SyncAll))
            .await
            .map_err(|e| StoreError::Flush(e.to_string()))??;
        debug!("Cache FLUSH");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::time::sleep;

    fn entry(quote: &str, rate: &str) -> RateEntry {
        RateEntry {
            base: "USD".parse().unwrap(),
            quote: quote.parse().unwrap(),
            rate: rate.parse().unwrap(),
            fetched_at: Utc::now(),
        }
    }

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_disk_cache_get_put() {
        let dir = tempdir().unwrap();
        let cache = DiskStore::open(dir.path()).unwrap();
        let usd_eur = entry("EUR", "0.92");

        // Initially, cache is empty
        assert!(cache.get(&usd_eur.key()).await.unwrap().is_none());

        cache.put(&usd_eur.key(), &usd_eur, HOUR).await.unwrap();
        assert_eq!(cache.get(&usd_eur.key()).await.unwrap(), Some(usd_eur));
    }

    #[tokio::test]
    async fn test_disk_cache_survives_reopen() {
        let dir = tempdir().unwrap();
        let usd_eur = entry("EUR", "0.92");
        {
            let cache = DiskStore::open(dir.path()).unwrap();
            cache.put(&usd_eur.key(), &usd_eur, HOUR).await.unwrap();
            cache.flush().await.unwrap();
        }

        let cache = DiskStore::open(dir.path()).unwrap();
        assert_eq!(cache.get(&usd_eur.key()).await.unwrap(), Some(usd_eur));
    }

    #[tokio::test]
    async fn test_disk_cache_ttl_expiration() {
        let dir = tempdir().unwrap();
        let cache = DiskStore::open(dir.path()).unwrap();
        let usd_eur = entry("EUR", "0.92");

        cache
            .put(&usd_eur.key(), &usd_eur, Duration::from_millis(10))
            .await
            .unwrap();
        assert!(cache.get(&usd_eur.key()).await.unwrap().is_some());

        // Wait for TTL expiration
        sleep(Duration::from_millis(20)).await;
        assert!(cache.get(&usd_eur.key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disk_cache_delete_and_clear() {
        let dir = tempdir().unwrap();
        let cache = DiskStore::open(dir.path()).unwrap();
        let usd_eur = entry("EUR", "0.92");
        let usd_gbp = entry("GBP", "0.79");

        cache.put(&usd_eur.key(), &usd_eur, HOUR).await.unwrap();
        cache.put(&usd_gbp.key(), &usd_gbp, HOUR).await.unwrap();

        cache.delete(&usd_eur.key()).await.unwrap();
        assert!(cache.get(&usd_eur.key()).await.unwrap().is_none());

        cache.clear().await.unwrap();
        assert!(cache.get(&usd_gbp.key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_record_is_an_error() {
        let dir = tempdir().unwrap();
        let cache = DiskStore::open(dir.path()).unwrap();
        let usd_eur = entry("EUR", "0.92");

        cache
            .partition
            .insert(usd_eur.key().to_string(), b"not json".to_vec())
            .unwrap();
        assert!(matches!(
            cache.get(&usd_eur.key()).await,
            Err(StoreError::Serialization(_))
        ));
    }
}
