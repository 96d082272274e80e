//! Storage abstraction for cached rates

use crate::core::currency::{PairKey, RateEntry};
use crate::core::error::StoreError;
use async_trait::async_trait;
use std::time::Duration;

/// Key/value persistence for rate entries with per-entry expiry.
///
/// Every backend gives the same guarantees to callers: a `put` is visible to the
/// next `get` in the same process, and an entry is not returned once its TTL
/// has passed. How expired entries get removed is up to the backend.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Backend identifier, used in logs.
    fn name(&self) -> &'static str;

    /// Returns the entry for `key`, or `None` when missing or expired.
    async fn get(&self, key: &PairKey) -> Result<Option<RateEntry>, StoreError>;

    /// Stores `entry` under `key`, replacing any previous entry.
    async fn put(&self, key: &PairKey, entry: &RateEntry, ttl: Duration)
    -> Result<(), StoreError>;

    /// Removes `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &PairKey) -> Result<(), StoreError>;

    /// Removes every entry.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Makes preceding writes durable. Backends that write through do nothing.
    async fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
