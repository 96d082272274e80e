//! Cached, coalesced exchange rate lookups.
//!
//! [`RateCache`] answers `get_rate(from, to)` from the [`CacheStore`] while the
//! entry is fresh. On a miss it fetches the whole table for the base currency
//! from the [`RateSource`], storing every pair it returns. Concurrent callers
//! needing the same base currency share a single fetch: the first one spawns
//! it and registers a watch channel, the rest wait on that channel.
//!
//! Reciprocal pairs are never derived from each other. `EUR:USD` is filled by
//! fetching the EUR table, not by inverting `USD:EUR`.

use crate::core::cache::CacheStore;
use crate::core::clock::{Clock, SystemClock};
use crate::core::currency::{CurrencyCode, PairKey, RateEntry, RateSource, RateTable};
use crate::core::error::{FetchError, SourceError, StoreError};
use crate::core::retry::{RetryPolicy, with_retry};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// Freshness, fallback and retry settings for a [`RateCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Age after which a cached rate is refreshed
    pub ttl: Duration,
    /// Oldest cached rate that may still be served when a refresh fails
    pub max_stale: Duration,
    pub retry: RetryPolicy,
    /// Longest a single caller waits for a fetch; the fetch itself keeps going
    pub wait_timeout: Option<Duration>,
}

impl CachePolicy {
    /// How long backends keep an entry. Must cover the stale window, or the
    /// fallback would find nothing to serve.
    pub fn retention(&self) -> Duration {
        self.ttl.max(self.max_stale)
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5 * 60),
            max_stale: Duration::from_secs(24 * 60 * 60),
            retry: RetryPolicy::default(),
            wait_timeout: None,
        }
    }
}

/// Result of one source fetch, shared with everyone who waited for it.
#[derive(Debug)]
pub struct FetchedTable {
    pub base: CurrencyCode,
    pub rates: RateTable,
    pub fetched_at: DateTime<Utc>,
}

type FetchOutcome = Result<Arc<FetchedTable>, FetchError>;
type PendingFetch = watch::Receiver<Option<FetchOutcome>>;

#[derive(Default)]
struct InFlight {
    pending: HashMap<CurrencyCode, PendingFetch>,
    /// Number of completed fetches per base currency
    generations: HashMap<CurrencyCode, u64>,
}

impl InFlight {
    fn generation(&self, base: &CurrencyCode) -> u64 {
        self.generations.get(base).copied().unwrap_or(0)
    }
}

struct Inner {
    store: Arc<dyn CacheStore>,
    source: Arc<dyn RateSource>,
    clock: Arc<dyn Clock>,
    policy: CachePolicy,
    in_flight: Mutex<InFlight>,
}

enum Lookup {
    Fresh(Decimal),
    Stale(RateEntry),
    Miss,
}

#[derive(Clone)]
pub struct RateCache {
    inner: Arc<Inner>,
}

impl RateCache {
    pub fn new(
        store: Arc<dyn CacheStore>,
        source: Arc<dyn RateSource>,
        policy: CachePolicy,
    ) -> Self {
        Self::with_clock(store, source, policy, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn CacheStore>,
        source: Arc<dyn RateSource>,
        policy: CachePolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                source,
                clock,
                policy,
                in_flight: Mutex::new(InFlight::default()),
            }),
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.inner.policy
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.inner.store
    }

    /// Whether a source fetch for `base` is currently running.
    pub fn is_fetching(&self, base: &CurrencyCode) -> bool {
        self.inner.lock_in_flight().pending.contains_key(base)
    }

    /// Returns how many units of `to` one unit of `from` buys.
    ///
    /// Identical currencies short-circuit to exactly 1 without touching the
    /// cache or the source.
    #[instrument(name = "RateLookup", skip(self), fields(from = %from, to = %to))]
    pub async fn get_rate(
        &self,
        from: &CurrencyCode,
        to: &CurrencyCode,
    ) -> Result<Decimal, FetchError> {
        if from == to {
            debug!("Identity pair, rate is 1");
            return Ok(Decimal::ONE);
        }

        let key = PairKey::new(from, to);
        loop {
            let seen_generation = self.inner.lock_in_flight().generation(from);
            let cached = match self.lookup(&key).await {
                Lookup::Fresh(rate) => return Ok(rate),
                Lookup::Stale(entry) => Some(entry),
                Lookup::Miss => None,
            };

            match self.join_or_start(from, seen_generation) {
                Some(pending) => {
                    let outcome = self.wait(from, pending).await;
                    return self.resolve(&key, outcome, cached);
                }
                // A fetch for this base finished after our read, look again
                None => continue,
            }
        }
    }

    /// Drops the cached rate for one pair.
    pub async fn invalidate(
        &self,
        from: &CurrencyCode,
        to: &CurrencyCode,
    ) -> Result<(), StoreError> {
        let key = PairKey::new(from, to);
        debug!("Invalidating {}", key);
        self.inner.store.delete(&key).await
    }

    async fn lookup(&self, key: &PairKey) -> Lookup {
        match self.inner.store.get(key).await {
            Ok(Some(entry)) => {
                let age = self.inner.age(&entry);
                if age < self.inner.policy.ttl {
                    debug!("Fresh rate for {} ({:?} old)", key, age);
                    Lookup::Fresh(entry.rate)
                } else {
                    debug!("Stale rate for {} ({:?} old)", key, age);
                    Lookup::Stale(entry)
                }
            }
            Ok(None) => Lookup::Miss,
            Err(e) => {
                warn!("Cache read for {} failed, fetching fresh rates: {}", key, e);
                Lookup::Miss
            }
        }
    }

    /// Joins the running fetch for `base`, or starts one. Returns `None` when a
    /// fetch completed since `seen_generation` was read.
    fn join_or_start(&self, base: &CurrencyCode, seen_generation: u64) -> Option<PendingFetch> {
        let mut in_flight = self.inner.lock_in_flight();
        if let Some(pending) = in_flight.pending.get(base) {
            debug!("Joining in-flight fetch for {}", base);
            return Some(pending.clone());
        }
        if in_flight.generation(base) != seen_generation {
            return None;
        }

        let (tx, rx) = watch::channel(None);
        in_flight.pending.insert(base.clone(), rx.clone());
        drop(in_flight);

        let guard = PendingGuard {
            inner: Arc::clone(&self.inner),
            base: base.clone(),
        };
        tokio::spawn(async move {
            let outcome = guard.inner.refresh(&guard.base).await;
            guard.complete(tx, outcome);
        });
        Some(rx)
    }

    async fn wait(&self, base: &CurrencyCode, mut pending: PendingFetch) -> FetchOutcome {
        let waiting = async {
            match pending.wait_for(Option::is_some).await {
                Ok(outcome) => match &*outcome {
                    Some(result) => result.clone(),
                    None => Err(FetchError::Aborted(base.clone())),
                },
                Err(_) => Err(FetchError::Aborted(base.clone())),
            }
        };

        match self.inner.policy.wait_timeout {
            Some(limit) => tokio::time::timeout(limit, waiting)
                .await
                .unwrap_or_else(|_| {
                    warn!("Gave up waiting for {} rates after {:?}", base, limit);
                    Err(FetchError::Timeout(base.clone()))
                }),
            None => waiting.await,
        }
    }

    fn resolve(
        &self,
        key: &PairKey,
        outcome: FetchOutcome,
        cached: Option<RateEntry>,
    ) -> Result<Decimal, FetchError> {
        let err = match outcome {
            Ok(table) => {
                return table
                    .rates
                    .get(&key.to)
                    .copied()
                    .ok_or_else(|| FetchError::NoData {
                        from: key.from.clone(),
                        to: key.to.clone(),
                    });
            }
            Err(err) => err,
        };

        if let Some(entry) = cached {
            let age = self.inner.age(&entry);
            if age <= self.inner.policy.max_stale {
                warn!(
                    "Serving stale rate for {} ({:?} old) after refresh failed: {}",
                    key, age, err
                );
                return Ok(entry.rate);
            }
            debug!("Cached rate for {} is past the stale limit ({:?} old)", key, age);
        }
        Err(err)
    }
}

impl Inner {
    fn lock_in_flight(&self) -> MutexGuard<'_, InFlight> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn age(&self, entry: &RateEntry) -> Duration {
        (self.clock.now() - entry.fetched_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    async fn refresh(&self, base: &CurrencyCode) -> FetchOutcome {
        info!("Fetching {} rates from source", base);
        let rates = with_retry(
            || self.source.fetch_table(base),
            &self.policy.retry,
            SourceError::is_transient,
        )
        .await
        .map_err(|e| FetchError::Source {
            base: base.clone(),
            attempts: e.attempts,
            source: e.error,
        })?;

        let fetched_at = self.clock.now();
        let retention = self.policy.retention();
        for (quote, rate) in rates.iter().filter(|(quote, _)| *quote != base) {
            let entry = RateEntry {
                base: base.clone(),
                quote: quote.clone(),
                rate: *rate,
                fetched_at,
            };
            if let Err(e) = self.store.put(&entry.key(), &entry, retention).await {
                warn!("Failed to cache {} in {} store: {}", entry.key(), self.store.name(), e);
            }
        }
        if let Err(e) = self.store.flush().await {
            warn!("Failed to flush {} store: {}", self.store.name(), e);
        }
        debug!("Stored {} {} rates", rates.len(), base);

        Ok(Arc::new(FetchedTable {
            base: base.clone(),
            rates,
            fetched_at,
        }))
    }
}

/// Owns the in-flight marker for one base currency. Dropping it, including
/// when the fetch task panics, clears the marker.
struct PendingGuard {
    inner: Arc<Inner>,
    base: CurrencyCode,
}

impl PendingGuard {
    fn complete(self, tx: watch::Sender<Option<FetchOutcome>>, outcome: FetchOutcome) {
        drop(self);
        tx.send_replace(Some(outcome));
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let mut in_flight = self.inner.lock_in_flight();
        in_flight.pending.remove(&self.base);
        *in_flight.generations.entry(self.base.clone()).or_default() += 1;
    }
}
