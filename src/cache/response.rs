//! Shared cache of rendered page payloads.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use crate::cache::lru::{CacheStats, LruCache};
use crate::config::CacheConfig;
use crate::observability::metrics;

const KEY_NAMESPACE: &str = "RSC";

/// A rendered payload (envelope excluded) and its validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPayload {
    pub body: Bytes,
    pub etag: String,
}

impl CachedPayload {
    /// Wrap `body`, deriving its ETag from the size and the current wall clock.
    pub fn new(body: Bytes) -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let etag = etag_for(body.len(), millis);
        Self { body, etag }
    }
}

/// `"v1-<size>-<generation millis>"`
pub fn etag_for(size: usize, generated_at_millis: u128) -> String {
    format!("\"v1-{}-{}\"", size, generated_at_millis)
}

/// Cache key for a request: `RSC:<METHOD>:<path>?<rawQuery>`.
pub fn cache_key(method: &str, path: &str, query: Option<&str>) -> String {
    format!(
        "{}:{}:{}?{}",
        KEY_NAMESPACE,
        method,
        path,
        query.unwrap_or_default()
    )
}

/// Prefix shared by every query variant of `GET <path>`.
pub fn route_prefix(path: &str) -> String {
    format!("{}:GET:{}?", KEY_NAMESPACE, path)
}

/// Thread-safe response cache shared by every request.
///
/// Every operation holds the lock for its full duration and never awaits,
/// so promotions and evictions are atomic with respect to each other.
///
/// Write-behind fills register a ticket with [`ResponseCache::begin_fill`].
/// Removing or invalidating a key drops its ticket, and
/// [`ResponseCache::complete_fill`] only stores while the ticket is current,
/// so a render started before an invalidation never lands after it.
#[derive(Debug)]
pub struct ResponseCache {
    inner: Mutex<Inner>,
    max_payload_bytes: usize,
    min_payload_bytes: usize,
}

#[derive(Debug)]
struct Inner {
    lru: LruCache<CachedPayload>,
    /// In-flight fills by key.
    fills: HashMap<String, u64>,
    next_fill: u64,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                lru: LruCache::new(config.capacity, Duration::from_secs(config.ttl_secs)),
                fills: HashMap::new(),
                next_fill: 0,
            }),
            max_payload_bytes: config.max_payload_bytes,
            min_payload_bytes: config.min_payload_bytes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("response cache mutex poisoned")
    }

    pub fn get(&self, key: &str) -> Option<CachedPayload> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&self, key: &str, now: Instant) -> Option<CachedPayload> {
        let mut inner = self.lock();
        let found = inner.lru.get(key, now).cloned();
        metrics::record_cache_size(inner.lru.len());
        found
    }

    pub fn set(&self, key: &str, payload: CachedPayload) {
        self.set_at(key, payload, Instant::now());
    }

    pub fn set_at(&self, key: &str, payload: CachedPayload, now: Instant) {
        let mut inner = self.lock();
        inner.lru.set(key, payload, now);
        metrics::record_cache_size(inner.lru.len());
    }

    /// Register a fill for `key`. A newer fill for the same key supersedes this one.
    pub fn begin_fill(&self, key: &str) -> u64 {
        let mut inner = self.lock();
        inner.next_fill += 1;
        let ticket = inner.next_fill;
        inner.fills.insert(key.to_string(), ticket);
        ticket
    }

    /// Store a finished fill. Returns `false` if the key was removed,
    /// invalidated or refilled since `begin_fill`.
    pub fn complete_fill(&self, key: &str, ticket: u64, payload: CachedPayload) -> bool {
        let mut inner = self.lock();
        if inner.fills.get(key) != Some(&ticket) {
            return false;
        }
        inner.fills.remove(key);
        inner.lru.set(key, payload, Instant::now());
        metrics::record_cache_size(inner.lru.len());
        true
    }

    /// Forget a fill that will not complete.
    pub fn cancel_fill(&self, key: &str, ticket: u64) {
        let mut inner = self.lock();
        if inner.fills.get(key) == Some(&ticket) {
            inner.fills.remove(key);
        }
    }

    pub fn remove(&self, key: &str) -> Option<CachedPayload> {
        let mut inner = self.lock();
        inner.fills.remove(key);
        let removed = inner.lru.remove(key);
        metrics::record_cache_size(inner.lru.len());
        removed
    }

    /// Drop every cached variant (any query string) of `GET <path>`.
    pub fn invalidate_route(&self, path: &str) -> usize {
        let prefix = route_prefix(path);
        self.invalidate_prefix(&prefix)
    }

    /// Drop every entry and in-flight fill whose key starts with `prefix`.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut inner = self.lock();
        inner.fills.retain(|key, _| !key.starts_with(prefix));
        let removed = inner.lru.remove_where(|key| key.starts_with(prefix));
        metrics::record_cache_size(inner.lru.len());
        if removed > 0 {
            tracing::info!(prefix = %prefix, removed, "Invalidated cached pages");
        }
        removed
    }

    /// Bounded expiry sweep from the cold end of the recency list.
    pub fn sweep(&self, budget: usize) -> usize {
        let mut inner = self.lock();
        let purged = inner.lru.purge_expired(Instant::now(), budget);
        metrics::record_cache_size(inner.lru.len());
        purged
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.fills.clear();
        inner.lru.clear();
        metrics::record_cache_size(0);
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().lru.stats()
    }

    pub fn reset_stats(&self) {
        self.lock().lru.reset_stats();
    }

    pub fn len(&self) -> usize {
        self.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Upper bound on bytes buffered by a single cache fill.
    pub fn max_payload_bytes(&self) -> usize {
        self.max_payload_bytes
    }

    /// Payloads below this size are served but never stored.
    pub fn min_payload_bytes(&self) -> usize {
        self.min_payload_bytes
    }
}
