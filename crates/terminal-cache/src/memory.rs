//! In-memory TTL cache.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use terminal_core::{Clock, SystemClock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};

/// TTL applied when the caller does not give one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

type Value = Arc<dyn Any + Send + Sync>;

/// Cache entry with creation and expiry timestamps.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// Cached value.
    pub data: T,
    /// When the value was stored.
    pub cached_at: DateTime<Utc>,
    /// When the value stops being served. Always after `cached_at`.
    pub expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    fn new(data: T, now: DateTime<Utc>, ttl: Duration) -> Self {
        let ttl = TimeDelta::from_std(ttl)
            .unwrap_or(TimeDelta::MAX)
            .max(TimeDelta::milliseconds(1));
        Self {
            data,
            cached_at: now,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// True once `expires_at` has passed.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Reads that returned live data.
    pub hits: u64,
    /// Reads that returned nothing.
    pub misses: u64,
    /// Entries removed because they expired.
    pub evictions: u64,
    /// Entries currently stored, expired or not.
    pub size: usize,
    /// `hits / (hits + misses)`, or `0.0` before any read.
    pub hit_rate: f64,
}

/// Process-wide key/value cache with per-entry expiry.
///
/// Values of any `Clone + Send + Sync + 'static` type can be stored; a read
/// with a different type than was stored is a miss. The cache never fails:
/// a poisoned lock is recovered rather than propagated.
///
/// Expired entries are evicted lazily by the read that finds them, or in bulk
/// by [`CacheStore::cleanup`].
#[derive(Debug)]
pub struct CacheStore {
    entries: Mutex<HashMap<String, CacheEntry<Value>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore {
    /// Create an empty cache using the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty cache driven by `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            clock,
            default_ttl: DEFAULT_TTL,
        }
    }

    /// Override the TTL used when `set` is called without one.
    #[must_use]
    pub const fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<Value>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Read a live value.
    ///
    /// Counts a hit when live data is returned and a miss otherwise. An entry
    /// found expired is removed and counted as both a miss and an eviction.
    #[instrument(skip(self), level = "trace")]
    pub fn get<T>(&self, key: &str) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let now = self.clock.now();
        let mut entries = self.entries();

        let expired = match entries.get(key) {
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                trace!("Cache miss");
                return None;
            }
            Some(entry) => entry.is_expired(now),
        };

        if expired {
            entries.remove(key);
            self.misses.fetch_add(1, Ordering::Relaxed);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            debug!("Evicted expired cache entry");
            return None;
        }

        match entries
            .get(key)
            .and_then(|entry| entry.data.downcast_ref::<T>())
        {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!("Cache hit");
                Some(value.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Cached value has a different type");
                None
            }
        }
    }

    /// Store a value, replacing whatever was there.
    ///
    /// `ttl` of `None` uses the default TTL (300 seconds).
    pub fn set<T>(&self, key: impl Into<String>, data: T, ttl: Option<Duration>)
    where
        T: Send + Sync + 'static,
    {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let entry = CacheEntry::new(Arc::new(data) as Value, self.clock.now(), ttl);
        self.entries().insert(key.into(), entry);
    }

    /// True if a live entry exists. Does not touch statistics.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.entries()
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Remove one entry. Returns whether it existed.
    pub fn delete(&self, key: &str) -> bool {
        self.entries().remove(key).is_some()
    }

    /// Remove every entry whose key starts with `prefix`.
    ///
    /// Returns the number of entries removed.
    pub fn clear_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(prefix, removed, "Cleared cache prefix");
        }
        removed
    }

    /// Remove every entry. Statistics are kept.
    pub fn clear(&self) {
        self.entries().clear();
        debug!("Cleared all cache entries");
    }

    /// Remove every expired entry. Returns the number evicted.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let evicted = before - entries.len();
        drop(entries);

        if evicted > 0 {
            self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
            debug!(evicted, "Evicted expired cache entries");
        }
        evicted
    }

    /// Snapshot of the statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            evictions: self.evictions.load(Ordering::Relaxed),
            size: self.len(),
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
        }
    }

    /// Zero the hit/miss/eviction counters.
    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }

    /// Number of stored entries, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// True when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Run [`cleanup`](Self::cleanup) every `interval` on the current tokio
    /// runtime until the returned handle is stopped.
    #[must_use]
    pub fn spawn_cleanup(self: &Arc<Self>, interval: Duration) -> CleanupTask {
        let token = CancellationToken::new();
        let cache = Arc::clone(self);
        let cancel = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; skip it.
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        cache.cleanup();
                    }
                }
            }
            debug!("Cache cleanup task stopped");
        });

        CleanupTask { token, handle }
    }
}

/// Handle to a periodic cleanup task.
#[derive(Debug)]
pub struct CleanupTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl CleanupTask {
    /// Stop the task and wait for it to finish.
    pub async fn stop(self) {
        self.token.cancel();
        let _ = self.handle.await;
    }
}
