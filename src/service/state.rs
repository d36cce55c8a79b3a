//! Shared service state.

use std::sync::Arc;
use serde_json::Value;

use crate::cache::{CacheConfig, ReportCache};
use crate::engine::ReportEngine;
use crate::store::ReportStore;

/// Shared service state.
///
/// Holds the report engine and the response cache. The cache belongs to
/// this state, so separate routers never share entries.
pub struct ServiceState<S: ReportStore + 'static> {
    /// Report engine over the store.
    pub engine: Arc<ReportEngine<S>>,
    /// Cached report bodies keyed by canonical query.
    pub cache: Arc<ReportCache<Value>>,
}

impl<S: ReportStore + 'static> ServiceState<S> {
    /// Create service state with an explicit cache configuration.
    pub fn new(store: S, cache_config: CacheConfig) -> Self {
        Self {
            engine: Arc::new(ReportEngine::new(store)),
            cache: Arc::new(ReportCache::new(cache_config)),
        }
    }

    /// Create service state with the cache configured from environment
    /// variables.
    pub fn from_env(store: S) -> Self {
        let config = CacheConfig::from_env();
        tracing::info!(
            max_entries = config.max_entries,
            ttl_secs = config.ttl.as_secs(),
            enabled = config.enabled,
            "Report cache configured"
        );
        Self::new(store, config)
    }
}

impl<S: ReportStore + 'static> Clone for ServiceState<S> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            cache: Arc::clone(&self.cache),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryReportStore;

    #[test]
    fn test_clones_share_cache() {
        let state = ServiceState::new(InMemoryReportStore::new(), CacheConfig::default());
        let clone = state.clone();

        state.cache.insert("/api/reports/overview", Value::Null);
        assert_eq!(clone.cache.stats().unwrap().len, 1);
    }

    #[test]
    fn test_states_do_not_share_cache() {
        let a = ServiceState::new(InMemoryReportStore::new(), CacheConfig::default());
        let b = ServiceState::new(InMemoryReportStore::new(), CacheConfig::default());

        a.cache.insert("/api/reports/overview", Value::Null);
        assert_eq!(b.cache.stats().unwrap().len, 0);
    }
}
