pub mod disk;
pub mod memory;
pub mod remote;

use crate::core::cache::CacheStore;
use crate::core::config::{AppConfig, Backend};
use crate::core::currency::{CurrencyCode, PairKey, RateEntry};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use disk::DiskStore;
use memory::MemoryStore;
use remote::RemoteStore;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Rate record as persisted by the disk and remote backends.
///
/// New fields must be optional so older records keep decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRate {
    pub pair_key: String,
    pub base: CurrencyCode,
    pub quote: CurrencyCode,
    pub rate: Decimal,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl StoredRate {
    pub fn new(key: &PairKey, entry: &RateEntry, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        Self {
            pair_key: key.to_string(),
            base: entry.base.clone(),
            quote: entry.quote.clone(),
            rate: entry.rate,
            fetched_at: entry.fetched_at,
            expires_at: entry
                .fetched_at
                .checked_add_signed(ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn into_entry(self) -> RateEntry {
        RateEntry {
            base: self.base,
            quote: self.quote,
            rate: self.rate,
            fetched_at: self.fetched_at,
        }
    }
}

/// Opens the cache backend selected for this run.
///
/// Called once at startup; everything downstream only sees the trait object.
pub fn build_store(config: &AppConfig, backend: Backend) -> Result<Arc<dyn CacheStore>> {
    debug!("Using {:?} cache backend", backend);
    let store: Arc<dyn CacheStore> = match backend {
        Backend::Memory => {
            let store = MemoryStore::new();
            store.spawn_sweeper(Duration::from_secs(config.cache.ttl_secs.max(1)));
            Arc::new(store)
        }
        Backend::Disk => {
            let path = config.default_data_path()?.join("cache");
            std::fs::create_dir_all(&path)
                .with_context(|| format!("Failed to create cache directory: {}", path.display()))?;
            let store = DiskStore::open(&path)
                .with_context(|| format!("Failed to open disk cache at {}", path.display()))?;
            Arc::new(store)
        }
        Backend::Remote => {
            let store = RemoteStore::new(&config.cache.url)
                .with_context(|| format!("Failed to set up remote cache at {}", config.cache.url))?;
            Arc::new(store)
        }
    };
    Ok(store)
}
