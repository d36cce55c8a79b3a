//! Read-through cache for computed reports.
//!
//! ## Keys
//!
//! Entries are keyed by the request's canonical query string (path plus
//! parameters in sorted order, see [`query_key`]) hashed with xxh64. The
//! full query is stored alongside the value and compared on lookup, so a
//! hash collision reads as a miss.
//!
//! ## Expiry
//!
//! An entry older than the configured TTL is a miss and is removed when it
//! is looked up. Capacity is bounded by an LRU; lookups `peek`, so entries
//! are evicted in insertion order.
//!
//! The cache is an ordinary value owned by whoever builds it (normally the
//! service state). Nothing here is global.

use lru::LruCache;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::future::Future;
use std::hash::Hasher;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use xxhash_rust::xxh64::Xxh64;

/// Default number of cached reports.
pub const DEFAULT_CACHE_ENTRIES: usize = 256;

/// Default time a cached report stays fresh.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// Configuration for the report cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    pub max_entries: usize,
    /// How long an entry stays fresh.
    pub ttl: Duration,
    /// Whether to enable the cache.
    pub enabled: bool,
}

impl CacheConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads `REPORT_CACHE_MAX_ENTRIES`, `REPORT_CACHE_TTL_SECS` and
    /// `REPORT_CACHE_ENABLED`.
    pub fn from_env() -> Self {
        Self {
            max_entries: std::env::var("REPORT_CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_CACHE_ENTRIES),
            ttl: std::env::var("REPORT_CACHE_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_CACHE_TTL),
            enabled: std::env::var("REPORT_CACHE_ENABLED")
                .ok()
                .map(|s| !matches!(s.to_lowercase().as_str(), "0" | "false" | "no" | "off"))
                .unwrap_or(true),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_CACHE_ENTRIES,
            ttl: DEFAULT_CACHE_TTL,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey(u64);

impl CacheKey {
    fn compute(query: &str) -> Self {
        let mut hasher = Xxh64::new(0);
        hasher.write(query.as_bytes());
        Self(hasher.finish())
    }
}

struct CacheEntry<V> {
    query: String,
    value: V,
    inserted_at: Instant,
}

/// Value returned by a cached lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheLookup<V> {
    /// The report.
    pub value: V,
    /// Whether this result came from cache.
    pub cache_hit: bool,
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Current number of entries in the cache.
    pub len: usize,
    /// Maximum capacity of the cache.
    pub cap: usize,
}

/// TTL + LRU cache of computed reports.
///
/// Thread-safe; clones of the value are handed out on hits.
///
/// # Example
///
/// ```rust,ignore
/// use slip_insights::cache::{ReportCache, CacheConfig};
///
/// let cache: ReportCache<serde_json::Value> = ReportCache::new(CacheConfig::default());
/// let lookup = cache.get_or_compute("/api/reports/overview", || compute_overview());
/// println!("cache hit: {}", lookup.cache_hit);
/// ```
pub struct ReportCache<V> {
    ttl: Duration,
    entries: Option<Arc<RwLock<LruCache<CacheKey, CacheEntry<V>>>>>,
}

impl<V: Clone> ReportCache<V> {
    /// Create a cache with the given configuration.
    ///
    /// A disabled config or zero capacity yields a cache that never hits.
    pub fn new(config: CacheConfig) -> Self {
        let entries = match NonZeroUsize::new(config.max_entries) {
            Some(size) if config.enabled => Some(Arc::new(RwLock::new(LruCache::new(size)))),
            _ => None,
        };

        Self {
            ttl: config.ttl,
            entries,
        }
    }

    /// Create a cache from environment variables.
    pub fn from_env() -> Self {
        Self::new(CacheConfig::from_env())
    }

    /// Look up a fresh entry.
    pub fn get(&self, query: &str) -> Option<V> {
        let entries = self.entries.as_ref()?;
        let key = CacheKey::compute(query);

        {
            let guard = entries.read();
            match guard.peek(&key) {
                Some(entry) if entry.query == query && entry.inserted_at.elapsed() < self.ttl => {
                    return Some(entry.value.clone());
                }
                Some(entry) if entry.query != query => return None,
                Some(_) => {}
                None => return None,
            }
        }

        // Stale: drop it unless a writer replaced it in between.
        let mut guard = entries.write();
        if guard
            .peek(&key)
            .map_or(false, |entry| entry.inserted_at.elapsed() >= self.ttl)
        {
            guard.pop(&key);
        }
        None
    }

    /// Store a value, replacing any previous entry for the query.
    pub fn insert(&self, query: &str, value: V) {
        if let Some(entries) = &self.entries {
            entries.write().put(
                CacheKey::compute(query),
                CacheEntry {
                    query: query.to_string(),
                    value,
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    /// Return the cached value or compute and store it.
    pub fn get_or_compute<F>(&self, query: &str, compute: F) -> CacheLookup<V>
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get(query) {
            return CacheLookup {
                value,
                cache_hit: true,
            };
        }

        let value = compute();
        self.insert(query, value.clone());
        CacheLookup {
            value,
            cache_hit: false,
        }
    }

    /// Async read-through with a fallible computation.
    ///
    /// No lock is held while `compute` runs. Errors are returned as is and
    /// leave the cache untouched.
    pub async fn get_or_try_compute<F, Fut, E>(
        &self,
        query: &str,
        compute: F,
    ) -> Result<CacheLookup<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(query) {
            return Ok(CacheLookup {
                value,
                cache_hit: true,
            });
        }

        let value = compute().await?;
        self.insert(query, value.clone());
        Ok(CacheLookup {
            value,
            cache_hit: false,
        })
    }

    /// Remove one entry.
    pub fn invalidate(&self, query: &str) {
        if let Some(entries) = &self.entries {
            entries.write().pop(&CacheKey::compute(query));
        }
    }

    /// Get cache statistics.
    ///
    /// Returns `None` if caching is disabled.
    pub fn stats(&self) -> Option<CacheStats> {
        self.entries.as_ref().map(|entries| {
            let entries = entries.read();
            CacheStats {
                len: entries.len(),
                cap: entries.cap().get(),
            }
        })
    }

    /// Clear the cache.
    ///
    /// Does nothing if caching is disabled.
    pub fn clear(&self) {
        if let Some(entries) = &self.entries {
            entries.write().clear();
        }
    }
}

/// Canonical cache key for a request: `path` alone, or `path?k=v&...`
/// with parameters in key order.
///
/// Keys and values are percent-encoded, so a value containing `&` or `=`
/// cannot spell out a different parameter set.
pub fn query_key(path: &str, params: &BTreeMap<String, String>) -> String {
    if params.is_empty() {
        return path.to_string();
    }
    let query: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect();
    format!("{}?{}", path, query.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_entries: usize, ttl: Duration) -> CacheConfig {
        CacheConfig {
            max_entries,
            ttl,
            enabled: true,
        }
    }

    #[test]
    fn test_miss_then_hit() {
        let cache = ReportCache::new(CacheConfig::default());
        let mut calls = 0;

        let first = cache.get_or_compute("/a", || {
            calls += 1;
            1
        });
        assert!(!first.cache_hit);

        let second = cache.get_or_compute("/a", || {
            calls += 1;
            2
        });
        assert!(second.cache_hit);
        assert_eq!(second.value, 1);
        assert_eq!(calls, 1);
        assert_eq!(cache.stats().unwrap().len, 1);
    }

    #[test]
    fn test_zero_ttl_always_misses() {
        let cache = ReportCache::new(config(8, Duration::ZERO));
        cache.insert("/a", 1);
        assert_eq!(cache.get("/a"), None);
        // Expired entry is evicted on access
        assert_eq!(cache.stats().unwrap().len, 0);
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = ReportCache::new(config(8, Duration::from_millis(20)));
        cache.insert("/a", 1);
        assert_eq!(cache.get("/a"), Some(1));

        std::thread::sleep(Duration::from_millis(40));
        let lookup = cache.get_or_compute("/a", || 2);
        assert!(!lookup.cache_hit);
        assert_eq!(lookup.value, 2);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let cache = ReportCache::new(config(2, Duration::from_secs(60)));
        cache.insert("/a", 1);
        cache.insert("/b", 2);
        assert_eq!(cache.get("/a"), Some(1));
        cache.insert("/c", 3);

        assert_eq!(cache.get("/a"), None);
        assert_eq!(cache.get("/b"), Some(2));
        assert_eq!(cache.get("/c"), Some(3));
        assert_eq!(cache.stats().unwrap(), CacheStats { len: 2, cap: 2 });
    }

    #[test]
    fn test_cache_disabled() {
        let cache = ReportCache::new(CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        });

        // Cache should be None
        assert!(cache.stats().is_none());

        cache.insert("/a", 1);
        assert_eq!(cache.get("/a"), None);
        assert!(!cache.get_or_compute("/a", || 1).cache_hit);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = ReportCache::new(CacheConfig::default());
        cache.insert("/a", 1);
        cache.insert("/b", 2);

        cache.invalidate("/a");
        assert_eq!(cache.get("/a"), None);
        assert_eq!(cache.get("/b"), Some(2));

        cache.clear();
        assert_eq!(cache.stats().unwrap().len, 0);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache: ReportCache<u32> = ReportCache::new(CacheConfig::default());

        let failed: Result<CacheLookup<u32>, &str> =
            cache.get_or_try_compute("/a", || async { Err("store down") }).await;
        assert_eq!(failed, Err("store down"));
        assert_eq!(cache.stats().unwrap().len, 0);

        let ok: Result<CacheLookup<u32>, &str> =
            cache.get_or_try_compute("/a", || async { Ok(7) }).await;
        assert_eq!(ok.unwrap().cache_hit, false);

        let hit: Result<CacheLookup<u32>, &str> =
            cache.get_or_try_compute("/a", || async { Ok(8) }).await;
        let hit = hit.unwrap();
        assert!(hit.cache_hit);
        assert_eq!(hit.value, 7);
    }

    #[test]
    fn test_query_key_is_order_independent() {
        let mut a = BTreeMap::new();
        a.insert("to".to_string(), "2024-01-31".to_string());
        a.insert("from".to_string(), "2024-01-01".to_string());

        assert_eq!(
            query_key("/api/reports/overview", &a),
            "/api/reports/overview?from=2024-01-01&to=2024-01-31"
        );
        assert_eq!(query_key("/api/reports/overview", &BTreeMap::new()), "/api/reports/overview");
    }

    #[test]
    fn test_query_key_escapes_separators() {
        let mut embedded = BTreeMap::new();
        embedded.insert("customer".to_string(), "acme&limit=5".to_string());

        let mut split = BTreeMap::new();
        split.insert("customer".to_string(), "acme".to_string());
        split.insert("limit".to_string(), "5".to_string());

        let embedded_key = query_key("/api/reports/customers/top", &embedded);
        let split_key = query_key("/api/reports/customers/top", &split);
        assert_ne!(embedded_key, split_key);
        assert_eq!(embedded_key, "/api/reports/customers/top?customer=acme%26limit%3D5");

        let cache = ReportCache::new(CacheConfig::default());
        cache.insert(&embedded_key, "acme&limit=5");
        let lookup = cache.get_or_compute(&split_key, || "acme");
        assert!(!lookup.cache_hit);
        assert_eq!(lookup.value, "acme");
    }
}
